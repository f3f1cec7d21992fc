//! # Parameter Strings
//!
//! Devices are configured from short plain-text descriptors so board code
//! can keep them as string constants:
//!
//! | Target | Layout | Example |
//! |--------|--------|---------|
//! | UART | `UART<unit>:<baud>@<size><parity><stop>` | `UART0:115200@8N1` |
//! | GPIO pin | `PORT<letter>:<bit>` | `PORTL:0` |
//! | Modbus RTU | `uart=<uart>,de_port=<pin>` | `uart=UART1:9600@8N1,de_port=PORTL:0` |
//!
//! Parsing validates against what the hardware supports, so a value that
//! parses is one the drivers accept.

use core::str::FromStr;

use crate::constants::{F_CPU, N_UART_UNITS, SUPPORTED_BAUD_RATES};
use crate::error::ConfigError;

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit
    None,
}

impl Parity {
    fn from_sign(sign: char) -> Result<Self, ConfigError> {
        match sign {
            'N' => Ok(Self::None),
            other => Err(ConfigError::UnsupportedParity(other)),
        }
    }
}

/// Validated UART settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Index into the hardware unit table
    pub unit: u8,
    /// Line speed, one of [`SUPPORTED_BAUD_RATES`]
    pub baud_rate: u32,
    /// Data bits per frame, 7 or 8
    pub frame_size: u8,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
}

impl UartConfig {
    /// Build and validate settings
    pub fn new(
        unit: u8,
        baud_rate: u32,
        frame_size: u8,
        parity: Parity,
        stop_bits: u8,
    ) -> Result<Self, ConfigError> {
        if unit as usize >= N_UART_UNITS {
            return Err(ConfigError::UnsupportedUnit(unit));
        }
        if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
            return Err(ConfigError::UnsupportedBaudRate(baud_rate));
        }
        if !matches!(frame_size, 7 | 8) {
            return Err(ConfigError::UnsupportedFrameSize(frame_size));
        }
        if !matches!(stop_bits, 1 | 2) {
            return Err(ConfigError::UnsupportedStopBits(stop_bits));
        }

        Ok(Self {
            unit,
            baud_rate,
            frame_size,
            parity,
            stop_bits,
        })
    }

    /// Baud rate register value for normal-speed asynchronous mode
    ///
    /// `round(f_cpu / (16 * baud) - 1)`
    pub fn baud_divisor(&self, f_cpu: u32) -> u16 {
        let step = 16 * self.baud_rate;
        let rounded = (f_cpu + step / 2) / step;
        rounded.saturating_sub(1) as u16
    }

    /// Divisor for the board's [`F_CPU`]
    pub fn default_baud_divisor(&self) -> u16 {
        self.baud_divisor(F_CPU)
    }
}

impl FromStr for UartConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.trim().strip_prefix("UART").ok_or(ConfigError::Malformed)?;
        let (unit, rest) = rest.split_once(':').ok_or(ConfigError::Malformed)?;
        let (baud, format) = rest.split_once('@').ok_or(ConfigError::Malformed)?;

        let unit: u8 = unit.parse().map_err(|_| ConfigError::Malformed)?;
        let baud_rate: u32 = baud.parse().map_err(|_| ConfigError::Malformed)?;

        // <size><parity><stop>, e.g. "8N1"
        let split = format
            .find(|c: char| !c.is_ascii_digit())
            .ok_or(ConfigError::Malformed)?;
        let (size, rest) = format.split_at(split);
        let mut chars = rest.chars();
        let parity_sign = chars.next().ok_or(ConfigError::Malformed)?;
        let stop = chars.as_str();

        let frame_size: u8 = size.parse().map_err(|_| ConfigError::Malformed)?;
        let stop_bits: u8 = stop.parse().map_err(|_| ConfigError::Malformed)?;
        let parity = Parity::from_sign(parity_sign)?;

        Self::new(unit, baud_rate, frame_size, parity, stop_bits)
    }
}

/// GPIO pin descriptor (`PORT<letter>:<bit>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    /// Port letter, `A`..=`L` without `I`
    pub port: char,
    /// Bit within the port, 0..=7
    pub bit: u8,
}

impl PinId {
    pub fn new(port: char, bit: u8) -> Result<Self, ConfigError> {
        let valid_port = matches!(port, 'A'..='L') && port != 'I';
        if !valid_port || bit > 7 {
            return Err(ConfigError::InvalidPin);
        }
        Ok(Self { port, bit })
    }
}

impl FromStr for PinId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.trim().strip_prefix("PORT").ok_or(ConfigError::InvalidPin)?;
        let (port, bit) = rest.split_once(':').ok_or(ConfigError::InvalidPin)?;

        let mut letters = port.chars();
        let port = match (letters.next(), letters.next()) {
            (Some(letter), None) => letter,
            _ => return Err(ConfigError::InvalidPin),
        };
        let bit: u8 = bit.parse().map_err(|_| ConfigError::InvalidPin)?;

        Self::new(port, bit)
    }
}

/// Engine binding: which UART carries the bus and which pin drives DE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModbusRtuConfig {
    pub uart: UartConfig,
    pub de_port: PinId,
}

impl FromStr for ModbusRtuConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut uart = None;
        let mut de_port = None;

        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = token.split_once('=').ok_or(ConfigError::Malformed)?;
            match key.trim() {
                "uart" => uart = Some(value.parse::<UartConfig>()?),
                "de_port" => de_port = Some(value.parse::<PinId>()?),
                _ => return Err(ConfigError::UnknownParameter),
            }
        }

        Ok(Self {
            uart: uart.ok_or(ConfigError::MissingParameter("uart"))?,
            de_port: de_port.ok_or(ConfigError::MissingParameter("de_port"))?,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CONSOLE_UART_PARAMS, DEFAULT_MODBUS_RTU_PARAMS};

    #[test]
    fn test_parse_console_uart() {
        let config: UartConfig = CONSOLE_UART_PARAMS.parse().unwrap();
        assert_eq!(config.unit, 0);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.frame_size, 8);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, 1);
    }

    #[test]
    fn test_parse_seven_bit_two_stop() {
        let config: UartConfig = "UART3:9600@7N2".parse().unwrap();
        assert_eq!(config.unit, 3);
        assert_eq!(config.frame_size, 7);
        assert_eq!(config.stop_bits, 2);
    }

    #[test]
    fn test_reject_unsupported_settings() {
        assert_eq!(
            "UART4:9600@8N1".parse::<UartConfig>(),
            Err(ConfigError::UnsupportedUnit(4))
        );
        assert_eq!(
            "UART0:9601@8N1".parse::<UartConfig>(),
            Err(ConfigError::UnsupportedBaudRate(9601))
        );
        assert_eq!(
            "UART0:9600@9N1".parse::<UartConfig>(),
            Err(ConfigError::UnsupportedFrameSize(9))
        );
        assert_eq!(
            "UART0:9600@8E1".parse::<UartConfig>(),
            Err(ConfigError::UnsupportedParity('E'))
        );
        assert_eq!(
            "UART0:9600@8N3".parse::<UartConfig>(),
            Err(ConfigError::UnsupportedStopBits(3))
        );
    }

    #[test]
    fn test_reject_malformed_uart() {
        for bad in [
            "",
            "UART",
            "UART0",
            "UART0:9600",
            "USART0:9600@8N1",
            "UART0:9600@8N",
            "UARTx:9600@8N1",
        ] {
            assert_eq!(bad.parse::<UartConfig>(), Err(ConfigError::Malformed), "{bad}");
        }
    }

    #[test]
    fn test_baud_divisor_rounding() {
        let at = |baud| UartConfig::new(0, baud, 8, Parity::None, 1).unwrap();
        // 16 MHz / (16 * 115200) - 1 = 7.68
        assert_eq!(at(115200).default_baud_divisor(), 8);
        // 16 MHz / (16 * 9600) - 1 = 103.17
        assert_eq!(at(9600).default_baud_divisor(), 103);
        assert_eq!(at(57600).default_baud_divisor(), 16);
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!("PORTL:0".parse::<PinId>(), Ok(PinId { port: 'L', bit: 0 }));
        assert_eq!("PORTB:7".parse::<PinId>(), Ok(PinId { port: 'B', bit: 7 }));
        assert_eq!("PORTI:0".parse::<PinId>(), Err(ConfigError::InvalidPin));
        assert_eq!("PORTB:8".parse::<PinId>(), Err(ConfigError::InvalidPin));
        assert_eq!("PORTBB:1".parse::<PinId>(), Err(ConfigError::InvalidPin));
        assert_eq!("PB:1".parse::<PinId>(), Err(ConfigError::InvalidPin));
    }

    #[test]
    fn test_parse_default_modbus_params() {
        let config: ModbusRtuConfig = DEFAULT_MODBUS_RTU_PARAMS.parse().unwrap();
        assert_eq!(config.uart.unit, 1);
        assert_eq!(config.uart.baud_rate, 9600);
        assert_eq!(config.de_port, PinId { port: 'L', bit: 0 });
    }

    #[test]
    fn test_modbus_params_errors() {
        assert_eq!(
            "uart=UART1:9600@8N1".parse::<ModbusRtuConfig>(),
            Err(ConfigError::MissingParameter("de_port"))
        );
        assert_eq!(
            "de_port=PORTL:0".parse::<ModbusRtuConfig>(),
            Err(ConfigError::MissingParameter("uart"))
        );
        assert_eq!(
            "uart=UART1:9600@8N1,de_port=PORTL:0,speed=fast".parse::<ModbusRtuConfig>(),
            Err(ConfigError::UnknownParameter)
        );
        assert_eq!(
            "uart=UART1:9600@8N1,de_port".parse::<ModbusRtuConfig>(),
            Err(ConfigError::Malformed)
        );
        assert_eq!(
            "uart=UART1:1@8N1,de_port=PORTL:0".parse::<ModbusRtuConfig>(),
            Err(ConfigError::UnsupportedBaudRate(1))
        );
    }
}
