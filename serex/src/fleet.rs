//! Fleet runner: one workflow over many independent sessions.

use std::fmt;

use futures_util::StreamExt;
use futures_util::stream;
use indexmap::IndexMap;
use log::info;

use crate::driver::{DeviceIdentity, DeviceSession, StepOutcome};
use crate::workflow::Workflow;

/// How the fleet runner schedules sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One device at a time, in discovery order.
    Sequential,

    /// Up to `n` devices at once. Sessions are fully independent (each
    /// owns its transport exclusively), so any bound is safe.
    Concurrent(usize),
}

/// Runs a workflow over every discovered session and aggregates the
/// per-device outcomes.
#[derive(Debug, Clone)]
pub struct FleetRunner {
    mode: RunMode,
}

impl FleetRunner {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn sequential() -> Self {
        Self::new(RunMode::Sequential)
    }

    pub fn concurrent(limit: usize) -> Self {
        Self::new(RunMode::Concurrent(limit))
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Run `workflow` against every session. One device's failure never
    /// affects the others; results funnel through a single collection
    /// point into the summary.
    pub async fn run_all(
        &self,
        sessions: Vec<DeviceSession>,
        workflow: &Workflow,
    ) -> FleetSummary {
        info!(
            "running workflow {:?} over {} device(s)",
            workflow.name(),
            sessions.len()
        );

        let mut summary = FleetSummary::new();
        match self.mode {
            RunMode::Sequential => {
                for mut session in sessions {
                    let identity = session.identity().clone();
                    let outcome = workflow.run(&mut session).await;
                    summary.record(identity, outcome);
                }
            }
            RunMode::Concurrent(limit) => {
                let results: Vec<(DeviceIdentity, StepOutcome)> =
                    stream::iter(sessions.into_iter().map(|mut session| async move {
                        let identity = session.identity().clone();
                        let outcome = workflow.run(&mut session).await;
                        (identity, outcome)
                    }))
                    .buffer_unordered(limit.max(1))
                    .collect()
                    .await;

                for (identity, outcome) in results {
                    summary.record(identity, outcome);
                }
            }
        }
        summary
    }
}

/// Per-device outcomes of one fleet run, in completion order.
///
/// Append-only while the run is in flight; read once at the end.
#[derive(Debug, Default)]
pub struct FleetSummary {
    results: IndexMap<DeviceIdentity, StepOutcome>,
}

impl FleetSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one device's outcome.
    pub fn record(&mut self, identity: DeviceIdentity, outcome: StepOutcome) {
        self.results.insert(identity, outcome);
    }

    pub fn get(&self, identity: &DeviceIdentity) -> Option<&StepOutcome> {
        self.results.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceIdentity, &StepOutcome)> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of devices whose whole workflow succeeded.
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|o| o.is_success()).count()
    }

    /// Number of devices that failed somewhere.
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Whether every device succeeded (vacuously true for an empty run).
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for FleetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "The summary is:")?;
        for (identity, outcome) in &self.results {
            writeln!(f, "  {identity}: {outcome}")?;
        }
        write!(
            f,
            "{} succeeded, {} failed of {} device(s)",
            self.succeeded(),
            self.failed(),
            self.len()
        )
    }
}
