//! # Serex
//!
//! Async serial-console automation library for zero-touch provisioning of
//! network edge devices.
//!
//! Serex drives an interactive CLI over a raw console byte stream the way a
//! human operator would — in the style of expect — and sequences multi-step
//! provisioning workflows (firmware bundle install, boot image selection,
//! guest-OS images, configuration templates, reload) across one or many
//! simultaneously attached devices, with fail-fast semantics per device.
//!
//! ## Features
//!
//! - Expect-style exchanges over tokio-serial consoles (9600-8N1)
//! - Debounced output accumulation with literal prompt matching
//! - Device discovery across a port naming pattern, with per-candidate
//!   failure isolation and hardware-type probing
//! - Declarative workflows: ordered named steps, conditional inclusion,
//!   first-failure short-circuit per device
//! - Sequential or bounded-concurrency fleet runs with an aggregated
//!   summary
//! - Cancellation tokens as the escape hatch from unbounded device waits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serex::{FleetRunner, ProvisionConfig, SerialOpener, discover};
//! use serex::workflow::steps::provisioning_workflow;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), serex::Error> {
//!     let config = ProvisionConfig::new()
//!         .with_bundle("ir800-universalk9_npe-bundle.SPA.156-2.T.bin")
//!         .with_image("ir800-universalk9_npe-mz.SPA.156-2.T")
//!         .with_enable_password("cisco123");
//!
//!     let opener = SerialOpener::new();
//!     let sessions = discover(&opener, "cu.SLAB_USBtoUART", &config).await?;
//!
//!     let workflow = provisioning_workflow(&config);
//!     let summary = FleetRunner::sequential().run_all(sessions, &workflow).await;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod fleet;
pub mod rest;
pub mod template;
pub mod transport;
pub mod workflow;

// Re-export main types for convenience
pub use channel::{CancelToken, ExpectSession, LineBuffer, Prompt};
pub use config::ProvisionConfig;
pub use discovery::{SerialOpener, TransportOpener, discover};
pub use driver::{DeviceIdentity, DeviceSession, DeviceType, SessionState, StepOutcome};
pub use error::Error;
pub use fleet::{FleetRunner, FleetSummary, RunMode};
pub use template::{ConfigTemplate, TemplateParams};
pub use transport::{SerialTransport, Transport};
pub use workflow::{Workflow, WorkflowStep};
