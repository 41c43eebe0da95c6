//! Declarative workflows: ordered, named steps over one device session.
//!
//! A workflow is data, not code: variations (skip the guest-OS steps when
//! no guest-OS image is configured) are expressed by conditionally
//! including steps in the list, never by branching inside step bodies.

pub mod steps;

use futures_core::future::BoxFuture;
use log::{debug, warn};

use crate::driver::{DeviceSession, StepOutcome};
use crate::error::Result;

/// Boxed async operation over a device session.
pub type StepFn =
    Box<dyn for<'a> Fn(&'a mut DeviceSession) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// One named step of a workflow.
pub struct WorkflowStep {
    name: String,
    run: StepFn,
}

impl WorkflowStep {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: for<'a> Fn(&'a mut DeviceSession) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered list of steps executed against one device, stopping at the
/// first failure.
pub struct Workflow {
    name: String,
    steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step<F>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: for<'a> Fn(&'a mut DeviceSession) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.steps.push(WorkflowStep::new(name, run));
        self
    }

    /// Append a step only when `included` holds. This is how optional
    /// artifacts drop their steps from the sequence.
    pub fn step_if<F>(self, included: bool, name: impl Into<String>, run: F) -> Self
    where
        F: for<'a> Fn(&'a mut DeviceSession) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        if included { self.step(name, run) } else { self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step names in execution order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_str())
    }

    /// Execute the steps strictly in order against one session.
    ///
    /// The first non-success aborts the rest: remaining steps are skipped
    /// and the failing step's name and reason become the device's outcome.
    /// A session that is already faulted runs nothing.
    pub async fn run(&self, session: &mut DeviceSession) -> StepOutcome {
        for step in &self.steps {
            if session.is_faulted() {
                return StepOutcome::failure(
                    step.name.clone(),
                    "session faulted, step not attempted",
                    session.identity().clone(),
                );
            }

            debug!(
                "{}: running step {:?} of workflow {:?}",
                session.port(),
                step.name,
                self.name
            );
            if let Err(error) = (step.run)(session).await {
                warn!(
                    "{}: step {:?} failed: {}",
                    session.port(),
                    step.name,
                    error
                );
                session.mark_faulted();
                return StepOutcome::failure(
                    step.name.clone(),
                    error.to_string(),
                    session.identity().clone(),
                );
            }
        }
        StepOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use futures_util::FutureExt;

    use super::*;
    use crate::config::ProvisionConfig;
    use crate::error::SessionError;
    use crate::transport::mock::MockTransport;

    fn idle_session() -> DeviceSession {
        let (transport, _handle) = MockTransport::new("mock0");
        DeviceSession::new(Box::new(transport), &ProvisionConfig::default())
    }

    /// A step that records its execution and returns a fixed result.
    fn recording_step(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        fail: bool,
    ) -> WorkflowStep {
        let log = log.clone();
        WorkflowStep::new(name, move |session: &mut DeviceSession| {
            let log = log.clone();
            let port = session.port().to_string();
            async move {
                log.lock().unwrap().push(name);
                if fail {
                    Err(SessionError::Faulted { port }.into())
                } else {
                    Ok(())
                }
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut workflow = Workflow::new("test");
        workflow.steps.push(recording_step(&log, "a", false));
        workflow.steps.push(recording_step(&log, "b", false));

        let mut session = idle_session();
        let outcome = workflow.run(&mut session).await;
        assert!(outcome.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_short_circuit_on_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut workflow = Workflow::new("test");
        workflow.steps.push(recording_step(&log, "a", false));
        workflow.steps.push(recording_step(&log, "b", true));
        workflow.steps.push(recording_step(&log, "c", false));

        let mut session = idle_session();
        let outcome = workflow.run(&mut session).await;

        assert_eq!(outcome.failed_step(), Some("b"));
        // c was never invoked
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_step_if_excludes_steps() {
        let workflow = Workflow::new("test")
            .step("always", |_s| async { Ok(()) }.boxed())
            .step_if(false, "skipped", |_s| async { Ok(()) }.boxed())
            .step_if(true, "included", |_s| async { Ok(()) }.boxed());

        let names: Vec<_> = workflow.step_names().collect();
        assert_eq!(names, vec!["always", "included"]);
    }

    #[tokio::test]
    async fn test_nothing_runs_on_faulted_session() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut workflow = Workflow::new("test");
        workflow.steps.push(recording_step(&log, "a", true));
        workflow.steps.push(recording_step(&log, "b", false));

        let mut session = idle_session();
        let first = workflow.run(&mut session).await;
        assert!(!first.is_success());
        // the failing step faulted the session via the error path; a rerun
        // attempts nothing
        log.lock().unwrap().clear();
        let second = workflow.run(&mut session).await;
        assert!(!second.is_success());
        assert!(log.lock().unwrap().is_empty());
    }
}
