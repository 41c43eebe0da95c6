//! Stateful device session speaking the target CLI dialect.
//!
//! Every operation composes `send` / `expect` / `drain_once` exchanges on
//! the underlying [`ExpectSession`]. Command strings and marker literals
//! match the device output exactly; they are the compatibility contract.

use std::time::Duration;

use log::{debug, info};
use secrecy::SecretString;
use tokio::time::Instant;

use super::identity::{DeviceIdentity, DeviceType};
use crate::channel::{
    AnyPrompt, Contains, EndsWith, ExpectSession, Prompt, strip_line_endings,
};
use crate::channel::CancelToken;
use crate::config::{ProvisionConfig, Timing, derive_tftp_server};
use crate::error::{ExpectError, Result, SessionError};
use crate::template::network_from_hostname_output;
use crate::transport::Transport;

/// CLI mode the session last observed, plus the terminal `Faulted` state.
///
/// A session enters `Faulted` whenever an operation fails and refuses all
/// further operations from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Unprivileged,
    Privileged,
    Config,
    Faulted,
}

/// One device console under automation.
///
/// All operations are strictly sequential: a session is a single command
/// shell, and the only suspension point is the expect engine's poll loop.
pub struct DeviceSession {
    expect: ExpectSession,
    identity: DeviceIdentity,
    state: SessionState,
    timing: Timing,
    tftp_server: Option<String>,
}

impl DeviceSession {
    /// Wrap a transport. The identity starts with the transport's port and
    /// an unknown device type; [`probe_identity`](Self::probe_identity)
    /// fills the type in during discovery.
    pub fn new(transport: Box<dyn Transport>, config: &ProvisionConfig) -> Self {
        let identity = DeviceIdentity::new(transport.identifier(), DeviceType::Unknown);
        Self {
            expect: ExpectSession::new(transport),
            identity,
            state: SessionState::Unknown,
            timing: config.timing(),
            tftp_server: None,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_faulted(&self) -> bool {
        self.state == SessionState::Faulted
    }

    pub fn port(&self) -> &str {
        self.expect.port()
    }

    /// Cancellation handle for this session's waits.
    pub fn cancel_token(&self) -> CancelToken {
        self.expect.cancel_token()
    }

    /// Direct access to the underlying expect session, for exchanges the
    /// dialect layer does not cover.
    pub fn expect_mut(&mut self) -> &mut ExpectSession {
        &mut self.expect
    }

    /// The TFTP server this session resolved, if any.
    pub fn tftp_server(&self) -> Option<&str> {
        self.tftp_server.as_deref()
    }

    pub async fn close(&mut self) -> Result<()> {
        self.expect.close().await
    }

    // --- operations ------------------------------------------------------

    /// Enter privileged mode.
    ///
    /// Idempotent: when the device already shows `#`, nothing is sent. From
    /// `>` the session sends `enable` and answers a password gate if one
    /// appears; the device does not always ask.
    pub async fn enter_enable(&mut self, password: &SecretString) -> Result<()> {
        self.ensure_live()?;
        let result = self.enter_enable_inner(password).await;
        self.record(result)
    }

    async fn enter_enable_inner(&mut self, password: &SecretString) -> Result<()> {
        info!("{}: entering enable mode", self.port());
        let (text, prompt) = self.wake_prompt().await?;
        match prompt {
            Prompt::Privileged => {
                debug!("{}: already in enable mode", self.port());
                Ok(())
            }
            Prompt::Unprivileged => {
                self.expect.send("enable").await?;
                let response = self.expect.drain_once(self.timing.poll_short).await?;
                if Prompt::classify(&response) == Prompt::Password {
                    self.expect.send_secret(password).await?;
                } else {
                    debug!(
                        "{}: no password prompt after \"enable\", carrying on",
                        self.port()
                    );
                }
                self.state = SessionState::Privileged;
                Ok(())
            }
            _ => Err(SessionError::UnexpectedPrompt {
                command: "enable".to_string(),
                expected: format!("{} or {}", Prompt::Privileged, Prompt::Unprivileged),
                response: strip_line_endings(&text),
            }
            .into()),
        }
    }

    /// Enable or disable console logging via configuration mode.
    pub async fn set_console_logging(&mut self, enabled: bool) -> Result<()> {
        self.ensure_live()?;
        let result = self.set_console_logging_inner(enabled).await;
        self.record(result)
    }

    async fn set_console_logging_inner(&mut self, enabled: bool) -> Result<()> {
        info!("{}: setting console logging to {}", self.port(), enabled);
        self.require_privileged("configure terminal").await?;
        self.expect.send("configure terminal").await?;
        self.expect_prompt(Prompt::Config, "configure terminal").await?;

        let command = if enabled {
            "logging console"
        } else {
            "no logging console"
        };
        self.expect.send(command).await?;
        self.expect_prompt(Prompt::Config, command).await?;

        self.expect.send("end").await?;
        self.expect_prompt(Prompt::Privileged, "end").await?;
        Ok(())
    }

    /// Drive the `copy tftp flash` dialog and wait out the transfer.
    ///
    /// Fails when any dialog prompt does not appear, or when the
    /// accumulated transfer text contains the device's `"Error"` marker.
    pub async fn copy_file_from_network(
        &mut self,
        server: &str,
        source: &str,
        dest: &str,
    ) -> Result<()> {
        self.ensure_live()?;
        let result = self.copy_file_inner(server, source, dest).await;
        self.record(result)
    }

    async fn copy_file_inner(&mut self, server: &str, source: &str, dest: &str) -> Result<()> {
        info!(
            "{}: copying {} from {} to flash",
            self.port(),
            source,
            server
        );
        self.require_privileged("copy tftp flash").await?;

        self.expect.send("copy tftp flash").await?;
        self.expect
            .expect(
                &Contains("Address or name of remote host"),
                Some(self.timing.timeout_default),
                self.timing.poll_short,
            )
            .await?;

        self.expect.send(server).await?;
        self.expect
            .expect(
                &Contains("Source filename"),
                Some(self.timing.timeout_default),
                self.timing.poll_short,
            )
            .await?;

        self.expect.send(source).await?;
        self.expect
            .expect(
                &Contains("Destination filename"),
                Some(self.timing.timeout_default),
                self.timing.poll_short,
            )
            .await?;

        self.expect.send(dest).await?;
        let mut transfer = self.expect.drain_once(self.timing.poll_short).await?;
        if transfer.contains("already existing") {
            debug!(
                "{}: destination already exists and shall be overwritten",
                self.port()
            );
            self.expect.send("").await?;
            transfer.push_str(&self.expect.drain_once(self.timing.poll_short).await?);
        }
        if transfer.contains("Accessing") {
            debug!(
                "{}: copy of {} from {} started",
                self.port(),
                source,
                server
            );
        }

        if !strip_line_endings(&transfer).ends_with('#') {
            let tail = self
                .expect
                .expect(
                    &EndsWith("#"),
                    self.timing.long_op_timeout,
                    self.timing.poll_long,
                )
                .await?;
            transfer.push_str(&tail);
        }
        self.state = SessionState::Privileged;

        // Case-sensitive on purpose: the literal the device emits is the
        // compatibility contract, even though it could match benign text.
        if transfer.contains("Error") {
            return Err(SessionError::DeviceReported {
                command: "copy tftp flash".to_string(),
                marker: "Error".to_string(),
                response: strip_line_endings(&transfer),
            }
            .into());
        }
        Ok(())
    }

    /// Install a firmware bundle from flash and persist the configuration.
    ///
    /// The install holds the console for minutes; the wait nudges a CR at
    /// each long poll interval to coax the prompt back out.
    pub async fn install_bundle(&mut self, name: &str) -> Result<()> {
        self.ensure_live()?;
        let result = self.install_bundle_inner(name).await;
        self.record(result)
    }

    async fn install_bundle_inner(&mut self, name: &str) -> Result<()> {
        info!("{}: installing {} from flash", self.port(), name);
        let command = format!("bundle install flash:/{name}");
        self.require_privileged(&command).await?;
        self.expect.send(&command).await?;
        self.nudge_until_any_suffix(&["#"], self.timing.poll_long, self.timing.long_op_timeout)
            .await?;
        self.write_memory_inner().await
    }

    /// Select the boot image and persist the configuration.
    ///
    /// The device rejects a bad image name immediately, so the `"Invalid"`
    /// marker fails the operation without waiting for a prompt.
    pub async fn set_boot_image(&mut self, name: &str) -> Result<()> {
        self.ensure_live()?;
        let result = self.set_boot_image_inner(name).await;
        self.record(result)
    }

    async fn set_boot_image_inner(&mut self, name: &str) -> Result<()> {
        info!("{}: setting boot image to {} from flash", self.port(), name);
        self.require_privileged("configure terminal").await?;
        self.expect.send("configure terminal").await?;
        self.expect_prompt(Prompt::Config, "configure terminal").await?;

        let command = format!("boot system flash:/{name}");
        self.expect.send(&command).await?;
        let response = self.expect.drain_once(self.timing.poll_short).await?;
        if response.contains("Invalid") {
            return Err(SessionError::DeviceReported {
                command,
                marker: "Invalid".to_string(),
                response: strip_line_endings(&response),
            }
            .into());
        }

        self.expect.send("end").await?;
        self.expect_prompt(Prompt::Privileged, "end").await?;
        self.write_memory_inner().await
    }

    /// Install a guest-OS image from flash and persist the configuration.
    pub async fn install_guest_image(&mut self, name: &str) -> Result<()> {
        self.ensure_live()?;
        let result = self.install_guest_image_inner(name).await;
        self.record(result)
    }

    async fn install_guest_image_inner(&mut self, name: &str) -> Result<()> {
        info!("{}: installing guest OS image {} from flash", self.port(), name);
        let command = format!("guest-os 1 image install flash:/{name} verify");
        self.require_privileged(&command).await?;
        self.expect.send(&command).await?;

        let response = self.expect.drain_once(self.timing.poll_short).await?;
        if response.contains("Inappropriate image type") {
            return Err(SessionError::DeviceReported {
                command,
                marker: "Inappropriate image type".to_string(),
                response: strip_line_endings(&response),
            }
            .into());
        }

        if !strip_line_endings(&response).ends_with('#') {
            self.expect
                .expect(
                    &EndsWith("#"),
                    self.timing.long_op_timeout,
                    self.timing.poll_long,
                )
                .await?;
        }
        self.state = SessionState::Privileged;
        self.write_memory_inner().await
    }

    /// Stop and uninstall the current guest-OS image, then persist.
    pub async fn remove_guest_image(&mut self) -> Result<()> {
        self.ensure_live()?;
        let result = self.remove_guest_image_inner().await;
        self.record(result)
    }

    async fn remove_guest_image_inner(&mut self) -> Result<()> {
        info!(
            "{}: stopping and uninstalling existing guest OS image",
            self.port()
        );
        self.require_privileged("guest-os 1 stop").await?;
        self.expect.send("guest-os 1 stop").await?;
        self.expect_prompt(Prompt::Privileged, "guest-os 1 stop").await?;

        self.expect.send("guest-os 1 image uninstall").await?;
        self.expect_prompt(Prompt::Privileged, "guest-os 1 image uninstall")
            .await?;
        self.write_memory_inner().await
    }

    /// Persist the running configuration (`write memory`).
    pub async fn write_memory(&mut self) -> Result<()> {
        self.ensure_live()?;
        let result = self.write_memory_inner().await;
        self.record(result)
    }

    async fn write_memory_inner(&mut self) -> Result<()> {
        self.require_privileged("write memory").await?;
        self.expect.send("write memory").await?;
        let _ = self.expect.drain_once(self.timing.poll_short).await?;
        Ok(())
    }

    /// Reload the device, answering up to two confirmation prompts.
    ///
    /// Zero, one, or two confirmations may appear depending on device state;
    /// `yes/no` questions get `yes`, `[confirm]` gets a bare CR.
    pub async fn reload(&mut self) -> Result<()> {
        self.ensure_live()?;
        let result = self.reload_inner().await;
        self.record(result)
    }

    async fn reload_inner(&mut self) -> Result<()> {
        info!("{}: reloading", self.port());
        self.require_privileged("reload").await?;
        self.expect.send("reload").await?;

        for _ in 0..2 {
            let response = self.expect.drain_once(self.timing.poll_short).await?;
            let flat = strip_line_endings(&response);
            if flat.contains("yes/no") {
                self.expect.send("yes").await?;
            } else if flat.contains("[confirm]") {
                self.expect.send("").await?;
            } else {
                break;
            }
        }

        // the console is going down with the device
        self.state = SessionState::Unknown;
        Ok(())
    }

    /// Erase the startup configuration (`clear start`), confirming the
    /// prompt with bare CRs.
    pub async fn clear_startup(&mut self) -> Result<()> {
        self.ensure_live()?;
        let result = self.clear_startup_inner().await;
        self.record(result)
    }

    async fn clear_startup_inner(&mut self) -> Result<()> {
        info!("{}: clearing startup configuration", self.port());
        self.require_privileged("clear start").await?;
        self.expect.send("clear start").await?;
        let response = self.expect.drain_once(self.timing.poll_short).await?;
        if response.contains("[confirm]") {
            self.expect.send("").await?;
            self.expect.send("").await?;
            let _ = self.expect.drain_once(self.timing.poll_short).await?;
        }
        Ok(())
    }

    /// Probe the hardware summary and classify the device type.
    ///
    /// An unrecognized summary yields [`DeviceType::Unknown`], which is not
    /// an error; workflows may still proceed generically.
    pub async fn probe_identity(&mut self) -> Result<DeviceType> {
        self.ensure_live()?;
        let result = self.probe_identity_inner().await;
        self.record(result)
    }

    async fn probe_identity_inner(&mut self) -> Result<DeviceType> {
        self.expect.send("show hardware | begin Device").await?;
        let response = self.expect.drain_once(self.timing.poll_short).await?;
        let device_type = DeviceType::from_response(&response);
        match device_type {
            DeviceType::Unknown => debug!(
                "{}: hardware summary not recognized, device type unknown",
                self.port()
            ),
            known => info!("{}: device type {}", self.port(), known),
        }
        self.identity.device_type = device_type;

        // settle back to a stable prompt before the next exchange
        self.nudge_until_any_suffix(&[">", "#"], self.timing.poll_short, None)
            .await?;
        Ok(device_type)
    }

    /// Send rendered configuration lines one at a time, settling to a `#`
    /// prompt after each. `"Invalid"` in a response fails the load; a bare
    /// `>` prompt means enable mode was lost and also fails it. Persists
    /// with `write memory` on success.
    pub async fn apply_config(&mut self, lines: &[String]) -> Result<()> {
        self.ensure_live()?;
        let result = self.apply_config_inner(lines).await;
        self.record(result)
    }

    async fn apply_config_inner(&mut self, lines: &[String]) -> Result<()> {
        info!(
            "{}: applying {} configuration lines",
            self.port(),
            lines.len()
        );
        self.require_privileged("configuration load").await?;

        for line in lines {
            let command = line.trim_end_matches(['\r', '\n']);
            self.expect.send(command).await?;

            let mut accumulated = String::new();
            loop {
                self.expect.send("").await?;
                let chunk = self.expect.drain_once(self.timing.poll_short).await?;
                accumulated.push_str(&chunk);

                if accumulated.contains("Invalid") {
                    return Err(SessionError::DeviceReported {
                        command: command.to_string(),
                        marker: "Invalid".to_string(),
                        response: strip_line_endings(&accumulated),
                    }
                    .into());
                }

                let flat = strip_line_endings(&accumulated);
                if flat.ends_with('#') {
                    break;
                }
                if flat.ends_with('>') {
                    return Err(SessionError::UnexpectedPrompt {
                        command: command.to_string(),
                        expected: Prompt::Privileged.to_string(),
                        response: flat,
                    }
                    .into());
                }
            }
        }
        self.write_memory_inner().await
    }

    /// Read the network name the hostname encodes, if any.
    pub async fn network_from_hostname(&mut self) -> Result<Option<String>> {
        self.ensure_live()?;
        let result = self.network_from_hostname_inner().await;
        self.record(result)
    }

    async fn network_from_hostname_inner(&mut self) -> Result<Option<String>> {
        self.require_privileged("show running-config | begin hostname")
            .await?;
        self.expect
            .send("show running-config | begin hostname")
            .await?;
        let response = self.expect.drain_once(self.timing.poll_short).await?;
        Ok(network_from_hostname_output(&response))
    }

    /// Resolve the TFTP server for this device: the configured address if
    /// one is given, otherwise derived once from the device's hostname
    /// network name and cached for the rest of the session.
    pub async fn resolve_tftp_server(&mut self, configured: Option<&str>) -> Result<String> {
        self.ensure_live()?;
        let result = self.resolve_tftp_server_inner(configured).await;
        self.record(result)
    }

    async fn resolve_tftp_server_inner(&mut self, configured: Option<&str>) -> Result<String> {
        if let Some(server) = configured {
            self.tftp_server = Some(server.to_string());
            return Ok(server.to_string());
        }
        if let Some(server) = &self.tftp_server {
            return Ok(server.clone());
        }

        let response_command = "show running-config | begin hostname";
        match self.network_from_hostname_inner().await? {
            Some(network) => {
                let server = derive_tftp_server(&network);
                info!(
                    "{}: derived TFTP server {} from network {}",
                    self.port(),
                    server,
                    network
                );
                self.tftp_server = Some(server.clone());
                Ok(server)
            }
            None => Err(SessionError::MissingNetwork {
                command: response_command.to_string(),
            }
            .into()),
        }
    }

    /// Nudge with bare CRs until the console settles to a `>` or `#`
    /// prompt. Used by discovery after multi-line device output.
    pub async fn settle_to_prompt(&mut self, poll: Duration) -> Result<()> {
        self.ensure_live()?;
        let result = self
            .nudge_until_any_suffix(&[">", "#"], poll, None)
            .await
            .map(|_| ());
        self.record(result)
    }

    // --- helpers ---------------------------------------------------------

    fn ensure_live(&self) -> Result<()> {
        if self.is_faulted() {
            return Err(SessionError::Faulted {
                port: self.port().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Mark the session faulted (no further operations will run).
    pub(crate) fn mark_faulted(&mut self) {
        self.state = SessionState::Faulted;
    }

    /// Mark the session faulted on failure, passing the result through.
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = SessionState::Faulted;
        }
        result
    }

    fn note_prompt(&mut self, prompt: Prompt) {
        match prompt {
            Prompt::Unprivileged => self.state = SessionState::Unprivileged,
            Prompt::Privileged => self.state = SessionState::Privileged,
            Prompt::Config => self.state = SessionState::Config,
            _ => {}
        }
    }

    /// Send a bare CR and wait for any recognizable prompt.
    async fn wake_prompt(&mut self) -> Result<(String, Prompt)> {
        self.expect.send("").await?;
        let text = self
            .expect
            .expect(
                &AnyPrompt,
                Some(self.timing.timeout_default),
                self.timing.poll_short,
            )
            .await?;
        let prompt = Prompt::classify(&text);
        self.note_prompt(prompt);
        Ok((text, prompt))
    }

    /// Wake the console and require the privileged prompt before `command`.
    async fn require_privileged(&mut self, command: &str) -> Result<()> {
        let (text, prompt) = self.wake_prompt().await?;
        if prompt == Prompt::Privileged {
            return Ok(());
        }
        Err(SessionError::UnexpectedPrompt {
            command: command.to_string(),
            expected: Prompt::Privileged.to_string(),
            response: strip_line_endings(&text),
        }
        .into())
    }

    /// Wait for any prompt and require it to classify as `want`.
    async fn expect_prompt(&mut self, want: Prompt, command: &str) -> Result<String> {
        let text = self
            .expect
            .expect(
                &AnyPrompt,
                Some(self.timing.timeout_default),
                self.timing.poll_short,
            )
            .await?;
        let got = Prompt::classify(&text);
        if got == want {
            self.note_prompt(got);
            return Ok(text);
        }
        Err(SessionError::UnexpectedPrompt {
            command: command.to_string(),
            expected: want.to_string(),
            response: strip_line_endings(&text),
        }
        .into())
    }

    /// Nudge a bare CR each poll interval until the accumulated response
    /// ends with one of the given suffixes.
    async fn nudge_until_any_suffix(
        &mut self,
        suffixes: &[&str],
        poll: Duration,
        limit: Option<Duration>,
    ) -> Result<String> {
        let start = Instant::now();
        let mut accumulated = String::new();
        loop {
            if let Some(budget) = limit {
                if start.elapsed() >= budget {
                    return Err(ExpectError::Timeout {
                        expecting: format!("one of {suffixes:?} as a suffix"),
                        waited: start.elapsed(),
                        accumulated,
                    }
                    .into());
                }
            }

            self.expect.send("").await?;
            let chunk = self.expect.drain_once(poll).await?;
            if !chunk.is_empty() {
                debug!(
                    "{}: response {:?} whilst waiting for a prompt",
                    self.port(),
                    strip_line_endings(&chunk)
                );
            }
            accumulated.push_str(&chunk);

            let flat = strip_line_endings(&accumulated);
            if suffixes.iter().any(|s| flat.ends_with(s)) {
                debug!("{}: back to a stable prompt, carrying on", self.port());
                self.note_prompt(Prompt::classify(&accumulated));
                return Ok(accumulated);
            }
        }
    }
}
