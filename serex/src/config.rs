//! Run configuration.
//!
//! One explicit structure carries everything the provisioning run needs:
//! artifact names, the TFTP server, the enable password, and the timing
//! parameters of the expect engine.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

/// Configuration for a provisioning run.
///
/// Artifact names are optional: leaving one unset drops the corresponding
/// steps from the workflow (e.g. no separate guest-OS image when the bundle
/// already carries one). `tftp_server` left unset means each device derives
/// its own server address from its hostname's network name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Firmware bundle filename on the TFTP server.
    pub bundle_name: Option<String>,

    /// Boot image filename (inside the bundle) to activate.
    pub image_name: Option<String>,

    /// Guest-OS image filename, when the guest OS is updated separately.
    pub guest_os_name: Option<String>,

    /// TFTP server address. `None` derives per device.
    pub tftp_server: Option<String>,

    /// Enable password for privileged mode.
    pub enable_password: SecretString,

    /// Poll interval for short interactive exchanges.
    pub poll_interval_short: Duration,

    /// Poll interval for long-running operations (copies, installs).
    pub poll_interval_long: Duration,

    /// Wait budget for short interactive exchanges.
    pub timeout_default: Duration,

    /// Optional ceiling on long-running operations. The default, `None`,
    /// waits as long as an image copy or bundle install takes; production
    /// deployments can cap it here or cancel through the session's
    /// [`CancelToken`](crate::channel::CancelToken).
    pub long_op_timeout: Option<Duration>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            bundle_name: None,
            image_name: None,
            guest_os_name: None,
            tftp_server: None,
            enable_password: SecretString::from(""),
            poll_interval_short: Duration::from_secs(1),
            poll_interval_long: Duration::from_secs(10),
            timeout_default: Duration::from_secs(10),
            long_op_timeout: None,
        }
    }
}

impl ProvisionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(mut self, name: impl Into<String>) -> Self {
        self.bundle_name = Some(name.into());
        self
    }

    pub fn with_image(mut self, name: impl Into<String>) -> Self {
        self.image_name = Some(name.into());
        self
    }

    pub fn with_guest_os(mut self, name: impl Into<String>) -> Self {
        self.guest_os_name = Some(name.into());
        self
    }

    pub fn with_tftp_server(mut self, server: impl Into<String>) -> Self {
        self.tftp_server = Some(server.into());
        self
    }

    pub fn with_enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = SecretString::from(password.into());
        self
    }

    pub fn with_long_op_timeout(mut self, timeout: Duration) -> Self {
        self.long_op_timeout = Some(timeout);
        self
    }

    pub(crate) fn timing(&self) -> Timing {
        Timing {
            poll_short: self.poll_interval_short,
            poll_long: self.poll_interval_long,
            timeout_default: self.timeout_default,
            long_op_timeout: self.long_op_timeout,
        }
    }
}

/// Timing knobs a device session copies out of the run configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timing {
    pub poll_short: Duration,
    pub poll_long: Duration,
    pub timeout_default: Duration,
    pub long_op_timeout: Option<Duration>,
}

/// Derive the TFTP server address from a device's network name, per the
/// deployment convention that the management host sits at `.2` where the
/// device's network name says `.0` (every `.0` octet is rewritten).
pub fn derive_tftp_server(network: &str) -> String {
    network.replace(".0", ".2")
}
