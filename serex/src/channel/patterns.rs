//! Prompt classification and buffer predicates.
//!
//! Every prompt literal the engine understands lives here, so the answer to
//! "what state is the shell in" is computed in exactly one place. Matching
//! is deliberately literal (fixed suffixes and substrings, case-sensitive):
//! the console dialect is a small closed set and the device output format is
//! the compatibility contract.

use std::fmt;

use super::buffer::{LineBuffer, strip_line_endings};

/// Classification of the remote shell's state, derived from the trailing
/// text of the accumulated output. Not persisted; recomputed per check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// `>` — user EXEC mode.
    Unprivileged,
    /// `#` — privileged EXEC mode.
    Privileged,
    /// `(config)#` — configuration mode.
    Config,
    /// `Password: ` — the enable password gate.
    Password,
    /// A `[confirm]` or `yes/no` confirmation question.
    Confirm,
    /// Anything else, including no output at all.
    Unknown,
}

impl Prompt {
    /// Classify a response. Line endings are stripped before matching, so
    /// callers can pass raw accumulated text.
    pub fn classify(text: &str) -> Prompt {
        let flat = strip_line_endings(text);
        if flat.ends_with("Password: ") {
            Prompt::Password
        } else if flat.ends_with("(config)#") {
            Prompt::Config
        } else if flat.ends_with('#') {
            Prompt::Privileged
        } else if flat.ends_with('>') {
            Prompt::Unprivileged
        } else if flat.contains("[confirm]") || flat.contains("yes/no") {
            Prompt::Confirm
        } else {
            Prompt::Unknown
        }
    }

    /// Whether this is a stable command prompt (as opposed to a question,
    /// a password gate, or garbage).
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            Prompt::Unprivileged | Prompt::Privileged | Prompt::Config
        )
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Prompt::Unprivileged => "\">\"",
            Prompt::Privileged => "\"#\"",
            Prompt::Config => "\"(config)#\"",
            Prompt::Password => "\"Password: \"",
            Prompt::Confirm => "confirmation",
            Prompt::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Predicate over the accumulated buffer, evaluated by
/// [`ExpectSession::expect`](super::ExpectSession::expect).
///
/// Implementations must be pure functions of the buffer contents.
pub trait BufferPredicate: Send + Sync {
    fn matches(&self, buffer: &LineBuffer) -> bool;

    /// Human-readable description used in timeout diagnostics.
    fn describe(&self) -> String;
}

/// Matches when the normalized buffer ends with the literal.
pub struct EndsWith(pub &'static str);

impl BufferPredicate for EndsWith {
    fn matches(&self, buffer: &LineBuffer) -> bool {
        buffer.ends_with(self.0)
    }

    fn describe(&self) -> String {
        format!("a {:?} suffix", self.0)
    }
}

/// Matches when the normalized buffer contains the literal anywhere.
pub struct Contains(pub &'static str);

impl BufferPredicate for Contains {
    fn matches(&self, buffer: &LineBuffer) -> bool {
        buffer.contains(self.0)
    }

    fn describe(&self) -> String {
        format!("text containing {:?}", self.0)
    }
}

/// Matches when the buffer classifies as anything other than
/// [`Prompt::Unknown`].
pub struct AnyPrompt;

impl BufferPredicate for AnyPrompt {
    fn matches(&self, buffer: &LineBuffer) -> bool {
        Prompt::classify(&buffer.normalized()) != Prompt::Unknown
    }

    fn describe(&self) -> String {
        "a recognizable prompt".to_string()
    }
}

impl<F> BufferPredicate for F
where
    F: Fn(&LineBuffer) -> bool + Send + Sync,
{
    fn matches(&self, buffer: &LineBuffer) -> bool {
        self(buffer)
    }

    fn describe(&self) -> String {
        "a custom predicate".to_string()
    }
}
