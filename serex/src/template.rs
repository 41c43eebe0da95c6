//! Configuration templates.
//!
//! Templates are plain-text command sequences with placeholder tokens for
//! network addressing, one file per device type (`<TYPE>.cfgtmpl`). Comment
//! lines start with `!`. Rendered lines are sent to the device one at a
//! time by [`DeviceSession::apply_config`](crate::driver::DeviceSession::apply_config).

use std::fs;
use std::path::{Path, PathBuf};

use crate::driver::DeviceType;
use crate::error::TemplateError;

/// Placeholder for the first network tuple.
const TOKEN_NT1: &str = "<NT1>";
/// Placeholder for the second network tuple (allocated per device).
const TOKEN_NT2: &str = "<NT2>";
/// Placeholder for the upper bound of the LAN DHCP pool.
const TOKEN_LDU: &str = "<LDU>";
/// Guard prefix on lines that only apply when images are processed.
const IMAGE_GUARD: &str = "#Process images:";

/// Substitution values for one device's rendering.
#[derive(Debug, Clone)]
pub struct TemplateParams {
    /// First network tuple (`<NT1>`).
    pub first_net_tuple: String,

    /// Second network tuple (`<NT2>`), allocated per device by the caller.
    pub second_net_tuple: u16,

    /// LAN DHCP pool upper bound (`<LDU>`).
    pub lan_dhcp_upper: String,

    /// Whether to activate the image-processing guard lines.
    pub process_images: bool,
}

impl TemplateParams {
    pub fn new(first_net_tuple: impl Into<String>, second_net_tuple: u16) -> Self {
        Self {
            first_net_tuple: first_net_tuple.into(),
            second_net_tuple,
            lan_dhcp_upper: "2".to_string(),
            process_images: false,
        }
    }

    /// Size the LAN DHCP pool for the device model: one address above the
    /// number of LAN ports.
    pub fn for_device(mut self, device_type: DeviceType) -> Self {
        if let Some(ports) = device_type.lan_port_count() {
            self.lan_dhcp_upper = (ports + 1).to_string();
        }
        self
    }

    /// The hostname suffix encoding the device's network name
    /// (`-SN<nt1>.<nt2>.1.0EN`). Discovery of the TFTP server reverses
    /// this encoding later via [`network_from_hostname_output`].
    fn hostname_suffix(&self) -> String {
        format!(
            "-SN{}.{}.1.0EN",
            self.first_net_tuple, self.second_net_tuple
        )
    }
}

/// A loaded configuration template.
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    lines: Vec<String>,
}

impl ConfigTemplate {
    /// Load a template file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(&text))
    }

    /// Look up the template for a probed device type in `dir`
    /// (`<dir>/<TYPE>.cfgtmpl`). A missing file is a
    /// [`TemplateError::NoTemplate`], the configuration-mismatch failure.
    pub fn for_device(dir: &Path, device_type: DeviceType) -> Result<Self, TemplateError> {
        let path: PathBuf = dir.join(format!("{}.cfgtmpl", device_type.as_str()));
        if !path.exists() {
            return Err(TemplateError::NoTemplate {
                device_type: device_type.as_str().to_string(),
                path,
            });
        }
        Self::load(&path)
    }

    /// Build a template from raw text.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Render the template: skip comments, substitute placeholders, expand
    /// guard lines, and append the network-encoding hostname suffix.
    pub fn render(&self, params: &TemplateParams) -> Vec<String> {
        let mut rendered = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.starts_with('!') {
                continue;
            }

            let mut line = line
                .replace(TOKEN_NT1, &params.first_net_tuple)
                .replace(TOKEN_NT2, &params.second_net_tuple.to_string())
                .replace(TOKEN_LDU, &params.lan_dhcp_upper);

            if params.process_images {
                line = line.replace(IMAGE_GUARD, "");
            }

            if line.starts_with("hostname") {
                line.push_str(&params.hostname_suffix());
            }

            rendered.push(line);
        }
        rendered
    }
}

/// Recover the network name a hostname encodes (`...-SN<network>EN`).
///
/// Returns the text between the first `SN` and the first `EN` marker, the
/// way the provisioning templates write it.
pub fn network_from_hostname_output(response: &str) -> Option<String> {
    let start = response.find("SN")?;
    let end = response.find("EN")?;
    let inner = response.get(start + 2..end)?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.to_string())
}
