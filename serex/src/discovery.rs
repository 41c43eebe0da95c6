//! Device discovery: scan candidate console ports, probe each for a live
//! device, classify it, and hand back ready sessions.
//!
//! Every failure is contained at the candidate level — a busy port, a dead
//! console, or a device stuck in its boot monitor is logged and skipped,
//! never fatal to discovery as a whole.

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::channel::strip_line_endings;
use crate::config::ProvisionConfig;
use crate::driver::DeviceSession;
use crate::error::{Result, TransportError};
use crate::transport::{SerialTransport, Transport};

/// Marker printed by a device stuck in the boot monitor.
const ROMMON_MARKER: &str = "rommon-2>";

/// Markers of the initial-setup dialog a factory-fresh device runs.
const SETUP_DIALOG_MARKERS: [&str; 2] = ["initial configuration dialog?", "Please answer"];

/// Enumerates and opens candidate transports.
///
/// This is the seam between discovery logic and the physical ports, so the
/// scan can run against scripted transports in tests.
#[async_trait]
pub trait TransportOpener: Send + Sync {
    /// Candidate port identifiers matching a naming pattern.
    async fn candidates(&self, pattern: &str) -> Result<Vec<String>, TransportError>;

    /// Open one candidate.
    async fn open(&self, identifier: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// Opener scanning `/dev` for serial console ports.
///
/// A candidate is any device node whose name contains the pattern (e.g.
/// `cu.SLAB_USBtoUART` matches the USB-to-UART bridge driver's nodes).
#[derive(Debug, Clone)]
pub struct SerialOpener {
    dev_dir: String,
}

impl SerialOpener {
    pub fn new() -> Self {
        Self {
            dev_dir: "/dev".to_string(),
        }
    }

    /// Scan a directory other than `/dev` (for containers and tests).
    pub fn with_dev_dir(dev_dir: impl Into<String>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }
}

impl Default for SerialOpener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportOpener for SerialOpener {
    async fn candidates(&self, pattern: &str) -> Result<Vec<String>, TransportError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dev_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.contains(pattern) {
                names.push(format!("{}/{}", self.dev_dir, name));
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open(&self, identifier: &str) -> Result<Box<dyn Transport>, TransportError> {
        let transport = SerialTransport::open(identifier)?;
        Ok(Box::new(transport))
    }
}

/// Discover live device consoles on ports matching `pattern`.
///
/// Each opened port is probed with a carriage return:
/// - no response at all → nothing connected, discarded;
/// - the boot monitor prompt → logged (the device needs a manual
///   `boot flash:/<image>`), discarded;
/// - the initial-setup dialog → answered `no`, then settled to a prompt;
/// - a stable `>`/`#` prompt → usable (configuration mode is exited first);
/// - anything else → not a usable console, discarded.
///
/// Surviving sessions are identity-probed before being returned.
pub async fn discover(
    opener: &dyn TransportOpener,
    pattern: &str,
    config: &ProvisionConfig,
) -> Result<Vec<DeviceSession>> {
    let candidates = opener.candidates(pattern).await?;
    info!("possible console ports: {candidates:?}");

    let mut sessions = Vec::new();
    for candidate in candidates {
        let transport = match opener.open(&candidate).await {
            Ok(transport) => transport,
            Err(e) => {
                error!("{e}");
                continue;
            }
        };

        match probe_console(transport, config).await {
            Ok(Some(session)) => {
                info!(
                    "discovered {} ({})",
                    session.port(),
                    session.identity().device_type
                );
                sessions.push(session);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("probe of {candidate} failed: {e}");
            }
        }
    }
    Ok(sessions)
}

/// Probe one opened transport; `Ok(None)` means "not a usable console".
async fn probe_console(
    transport: Box<dyn Transport>,
    config: &ProvisionConfig,
) -> Result<Option<DeviceSession>> {
    let mut session = DeviceSession::new(transport, config);
    let port = session.port().to_string();

    session.expect_mut().send("").await?;
    let response = session
        .expect_mut()
        .drain_once(config.poll_interval_short)
        .await?;
    let flat = strip_line_endings(&response);

    if flat.is_empty() {
        debug!("{port}: empty response, seems not to be connected to a device");
        return Ok(None);
    }

    if flat.contains(ROMMON_MARKER) {
        error!(
            "{port}: device is in the boot monitor and needs a manual \"boot flash:/<image>\""
        );
        return Ok(None);
    }

    if SETUP_DIALOG_MARKERS.iter().any(|m| response.contains(m)) {
        debug!("{port}: initial configuration dialog, answering no");
        session.expect_mut().send("no").await?;
        // the dialog takes a while to wind down; settle on a slower cadence
        session
            .settle_to_prompt(config.poll_interval_short * 5)
            .await?;
    } else if flat.ends_with('>') || flat.ends_with('#') {
        debug!("{port}: prompt present, connected to a device");
        if flat.contains("config") {
            session.expect_mut().send("end").await?;
            let _ = session
                .expect_mut()
                .drain_once(config.poll_interval_short)
                .await?;
        }
    } else {
        debug!("{port}: unrecognized response {flat:?}, not a usable console");
        return Ok(None);
    }

    session.probe_identity().await?;
    Ok(Some(session))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::driver::DeviceType;
    use crate::transport::mock::{MockTransport, Rule};

    /// Opener over a fixed set of scripted ports, some of which may fail
    /// to open.
    struct MockOpener {
        ports: Mutex<HashMap<String, Option<Vec<Rule>>>>,
    }

    impl MockOpener {
        fn new(ports: Vec<(&str, Option<Vec<Rule>>)>) -> Self {
            Self {
                ports: Mutex::new(
                    ports
                        .into_iter()
                        .map(|(name, rules)| (name.to_string(), rules))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl TransportOpener for MockOpener {
        async fn candidates(&self, pattern: &str) -> Result<Vec<String>, TransportError> {
            let mut names: Vec<String> = self
                .ports
                .lock()
                .unwrap()
                .keys()
                .filter(|name| name.contains(pattern))
                .cloned()
                .collect();
            names.sort();
            Ok(names)
        }

        async fn open(&self, identifier: &str) -> Result<Box<dyn Transport>, TransportError> {
            let rules = self
                .ports
                .lock()
                .unwrap()
                .get_mut(identifier)
                .and_then(Option::take);
            match rules {
                Some(rules) => {
                    let (transport, _handle) = MockTransport::scripted(identifier, rules);
                    Ok(Box::new(transport))
                }
                None => Err(TransportError::OpenFailed {
                    port: identifier.to_string(),
                    reason: "resource busy".to_string(),
                }),
            }
        }
    }

    fn live_device_rules(hardware: &str) -> Vec<Rule> {
        vec![
            Rule::on("\r", "Router#"),
            Rule::on("show hardware | begin Device", hardware),
            Rule::on("\r", "Router#"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_isolates_open_failures() {
        let opener = MockOpener::new(vec![
            (
                "cu.SLAB_USBtoUART0",
                Some(live_device_rules("IR829GW-LTE-GA-EK9\r\n")),
            ),
            // the middle port fails to open
            ("cu.SLAB_USBtoUART1", None),
            (
                "cu.SLAB_USBtoUART2",
                Some(live_device_rules("IR809G-LTE-GA-K9\r\n")),
            ),
        ]);

        let sessions = discover(&opener, "SLAB_USBtoUART", &ProvisionConfig::default())
            .await
            .unwrap();

        let ports: Vec<_> = sessions.iter().map(|s| s.port().to_string()).collect();
        assert_eq!(ports, vec!["cu.SLAB_USBtoUART0", "cu.SLAB_USBtoUART2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_classifies_device_types() {
        let opener = MockOpener::new(vec![(
            "cu.SLAB_USBtoUART0",
            Some(live_device_rules(
                "Device#  PID\r\n*0  IR829GW-LTE-GA-EK9  FGL1234\r\n",
            )),
        )]);

        let sessions = discover(&opener, "SLAB_USBtoUART", &ProvisionConfig::default())
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].identity().device_type, DeviceType::Ir829);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_discards_silent_ports() {
        let opener = MockOpener::new(vec![("cu.SLAB_USBtoUART0", Some(vec![]))]);
        let sessions = discover(&opener, "SLAB_USBtoUART", &ProvisionConfig::default())
            .await
            .unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_discards_boot_monitor() {
        let opener = MockOpener::new(vec![(
            "cu.SLAB_USBtoUART0",
            Some(vec![Rule::on("\r", "rommon-2>")]),
        )]);
        let sessions = discover(&opener, "SLAB_USBtoUART", &ProvisionConfig::default())
            .await
            .unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_answers_setup_dialog() {
        let opener = MockOpener::new(vec![(
            "cu.SLAB_USBtoUART0",
            Some(vec![
                Rule::on(
                    "\r",
                    "Would you like to enter the initial configuration dialog? [yes/no]: ",
                ),
                Rule::silent("no"),
                Rule::on("\r", "Router>"),
                Rule::on("show hardware | begin Device", "IR809G-LTE-GA-K9\r\n"),
                Rule::on("\r", "Router>"),
            ]),
        )]);

        let sessions = discover(&opener, "SLAB_USBtoUART", &ProvisionConfig::default())
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].identity().device_type, DeviceType::Ir809);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_exits_config_mode() {
        let opener = MockOpener::new(vec![(
            "cu.SLAB_USBtoUART0",
            Some(vec![
                Rule::on("\r", "Router(config)#"),
                Rule::on("end", "Router#"),
                Rule::on("show hardware | begin Device", "IR829GW-LTE-GA-EK9\r\n"),
                Rule::on("\r", "Router#"),
            ]),
        )]);

        let sessions = discover(&opener, "SLAB_USBtoUART", &ProvisionConfig::default())
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_pattern_filters_candidates() {
        let opener = MockOpener::new(vec![
            ("cu.SLAB_USBtoUART0", Some(vec![])),
            ("tty.Bluetooth", Some(vec![])),
        ]);
        let candidates = opener.candidates("SLAB_USBtoUART").await.unwrap();
        assert_eq!(candidates, vec!["cu.SLAB_USBtoUART0"]);
    }
}
