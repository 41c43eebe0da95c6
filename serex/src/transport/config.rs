//! Serial link settings.

use tokio_serial::{DataBits, Parity, StopBits};

/// Serial link settings for a device console.
///
/// Console UARTs on the supported hardware run 9600 baud, 8 data bits, no
/// parity, 1 stop bit. The defaults match the physical link and are not
/// negotiable on the device side; the struct exists so the parameters are
/// named at the open site rather than scattered as magic numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_link_settings() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
    }
}
