//! Error types for serex.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for serex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Serial transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Expect engine errors (poll loop, timeouts, cancellation)
    #[error("Expect error: {0}")]
    Expect(#[from] ExpectError),

    /// Device session errors (wrong prompt, device-reported failure)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration template errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Fleet-management REST API errors
    #[error("REST error: {0}")]
    Rest(#[from] RestError),
}

/// Transport layer errors (port open, read, write).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port could not be opened (busy, missing driver, unplugged).
    #[error("Port {port} not available: {reason}")]
    OpenFailed { port: String, reason: String },

    /// The port vanished or errored mid-session.
    #[error("Port {port} unavailable: {source}")]
    Unavailable {
        port: String,
        #[source]
        source: io::Error,
    },

    /// I/O error on an open port
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Expect engine errors.
///
/// Both variants carry everything accumulated before the failure so the
/// failing exchange can be reconstructed from the error alone.
#[derive(Error, Debug)]
pub enum ExpectError {
    /// The predicate never held within the wait budget.
    #[error("no match for {expecting} after {waited:?}; accumulated {accumulated:?}")]
    Timeout {
        expecting: String,
        waited: Duration,
        accumulated: String,
    },

    /// The wait was aborted through a [`CancelToken`](crate::channel::CancelToken).
    #[error("wait for {expecting} cancelled after {waited:?}; accumulated {accumulated:?}")]
    Cancelled {
        expecting: String,
        waited: Duration,
        accumulated: String,
    },
}

impl ExpectError {
    /// The text accumulated before the exchange failed.
    pub fn accumulated(&self) -> &str {
        match self {
            ExpectError::Timeout { accumulated, .. } => accumulated,
            ExpectError::Cancelled { accumulated, .. } => accumulated,
        }
    }
}

/// Device session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The device answered with a syntactically valid but contextually
    /// wrong prompt (e.g. `>` where `#` was required).
    #[error("after {command:?} expected a {expected} prompt, got {response:?}")]
    UnexpectedPrompt {
        command: String,
        expected: String,
        response: String,
    },

    /// The device echoed an error marker in its response.
    #[error("device reported {marker:?} after {command:?}: {response:?}")]
    DeviceReported {
        command: String,
        marker: String,
        response: String,
    },

    /// Operation attempted on a session already marked faulted.
    #[error("session on {port} is faulted, refusing further operations")]
    Faulted { port: String },

    /// The running configuration's hostname does not encode a network name.
    #[error("no SN..EN network name in the output of {command:?}")]
    MissingNetwork { command: String },
}

/// Configuration template errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No template exists for the probed device type.
    #[error("no configuration template for device type {device_type:?} at {}", path.display())]
    NoTemplate { device_type: String, path: PathBuf },

    /// Template file could not be read.
    #[error("failed to read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fleet-management REST API errors.
#[derive(Error, Debug)]
pub enum RestError {
    /// HTTP-level failure (connect, TLS, serialization).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered outside the 2xx range.
    #[error("{operation} answered {status}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
    },

    /// The token service answered 2xx but without a usable token.
    #[error("token service returned no token")]
    MissingToken,

    /// Local file handed to an import could not be read.
    #[error("failed to read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias defaulting to serex's Error.
pub type Result<T, E = Error> = std::result::Result<T, E>;
