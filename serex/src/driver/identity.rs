//! Device identity: physical port plus probed hardware type.

use std::fmt;

/// Known hardware models, classified from the `show hardware` summary.
///
/// `Unknown` is not an error: workflows that don't depend on the model
/// (bundle installs, reloads) proceed generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    /// IR829 ruggedized router (4 LAN ports, integrated AP).
    Ir829,
    /// IR809 ruggedized router (2 LAN ports).
    Ir809,
    #[default]
    Unknown,
}

impl DeviceType {
    const IR829_MARKER: &'static str = "IR829GW-LTE-GA-EK9";
    const IR809_MARKER: &'static str = "IR809G-LTE-GA-K9";

    /// Classify a hardware-summary response by substring match against the
    /// known model identifiers.
    pub fn from_response(response: &str) -> DeviceType {
        if response.contains(Self::IR829_MARKER) {
            DeviceType::Ir829
        } else if response.contains(Self::IR809_MARKER) {
            DeviceType::Ir809
        } else {
            DeviceType::Unknown
        }
    }

    /// The model identifier as the device prints it, or `"unknown"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Ir829 => Self::IR829_MARKER,
            DeviceType::Ir809 => Self::IR809_MARKER,
            DeviceType::Unknown => "unknown",
        }
    }

    /// Number of LAN switch ports on the model, when known. Drives the
    /// upper bound of the LAN DHCP pool in configuration templates.
    pub fn lan_port_count(&self) -> Option<u8> {
        match self {
            DeviceType::Ir829 => Some(4),
            DeviceType::Ir809 => Some(2),
            DeviceType::Unknown => None,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one attached device: where it is and what it is.
///
/// Established during discovery and immutable for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// Physical port identifier.
    pub port: String,

    /// Probed hardware type.
    pub device_type: DeviceType,
}

impl DeviceIdentity {
    pub fn new(port: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            port: port.into(),
            device_type,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.device_type, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ir829() {
        let response = "Device#    PID              SN\r\n*0        IR829GW-LTE-GA-EK9  FGL1234\r\n";
        assert_eq!(DeviceType::from_response(response), DeviceType::Ir829);
    }

    #[test]
    fn test_classify_ir809() {
        assert_eq!(
            DeviceType::from_response("... IR809G-LTE-GA-K9 ..."),
            DeviceType::Ir809
        );
    }

    #[test]
    fn test_classify_unknown_is_not_an_error() {
        let device_type = DeviceType::from_response("some other hardware");
        assert_eq!(device_type, DeviceType::Unknown);
        assert_eq!(device_type.as_str(), "unknown");
    }

    #[test]
    fn test_lan_port_counts() {
        assert_eq!(DeviceType::Ir829.lan_port_count(), Some(4));
        assert_eq!(DeviceType::Ir809.lan_port_count(), Some(2));
        assert_eq!(DeviceType::Unknown.lan_port_count(), None);
    }
}
