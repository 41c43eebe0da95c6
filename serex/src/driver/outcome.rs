//! Per-device workflow outcome.

use std::fmt;

use super::identity::DeviceIdentity;

/// Aggregate result of running a workflow against one device: the outcome
/// of its first failing step, or `Success` when every step succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,

    Failure {
        /// Name of the step that failed.
        step: String,
        /// Reason string sufficient to reconstruct the failing exchange.
        reason: String,
        /// The device the failure belongs to.
        device: DeviceIdentity,
    },
}

impl StepOutcome {
    pub fn failure(
        step: impl Into<String>,
        reason: impl Into<String>,
        device: DeviceIdentity,
    ) -> Self {
        StepOutcome::Failure {
            step: step.into(),
            reason: reason.into(),
            device,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }

    /// The failing step name, if any.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            StepOutcome::Success => None,
            StepOutcome::Failure { step, .. } => Some(step),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Success => f.write_str("all steps succeeded"),
            StepOutcome::Failure { step, reason, .. } => {
                write!(f, "failed at step {step:?}: {reason}")
            }
        }
    }
}
