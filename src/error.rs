//! Error types
//!
//! Two families of failure exist. [`ModbusError`] reports a frame that arrived
//! but cannot be trusted or stored; [`ConfigError`] reports a parameter string
//! that cannot be turned into a working device. Backpressure is not an error
//! and is signalled through [`nb::Error::WouldBlock`] instead.

#[cfg(not(feature = "std"))]
use core::fmt;

/// Result type for frame-level operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Frame-level failures of the RTU engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModbusError {
    /// The received CRC does not match the one recomputed over the frame
    #[cfg_attr(
        feature = "std",
        error("CRC mismatch: computed {expected:#06X}, received {received:#06X}")
    )]
    Crc {
        /// CRC recomputed over the received fields
        expected: u16,
        /// CRC carried by the frame
        received: u16,
    },

    /// The peer declared more payload than the response buffer holds
    #[cfg_attr(
        feature = "std",
        error("declared payload of {declared} bytes exceeds capacity of {capacity}")
    )]
    Capacity {
        /// Byte count announced in the frame
        declared: usize,
        /// Fixed payload capacity
        capacity: usize,
    },
}

impl ModbusError {
    /// True for corrupted frames, false for misbehaving peers
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Crc { .. })
    }
}

#[cfg(not(feature = "std"))]
impl fmt::Display for ModbusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc { expected, received } => write!(
                f,
                "CRC mismatch: computed {:#06X}, received {:#06X}",
                expected, received
            ),
            Self::Capacity { declared, capacity } => write!(
                f,
                "declared payload of {} bytes exceeds capacity of {}",
                declared, capacity
            ),
        }
    }
}

/// Setup failures for UART, GPIO and engine parameter strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The string does not follow the expected layout
    #[cfg_attr(feature = "std", error("malformed parameter string"))]
    Malformed,

    /// No hardware unit with this index
    #[cfg_attr(feature = "std", error("unsupported UART unit {0}"))]
    UnsupportedUnit(u8),

    /// Baud rate missing from the supported table
    #[cfg_attr(feature = "std", error("unsupported baud rate {0}"))]
    UnsupportedBaudRate(u32),

    /// Only 7 and 8 bit frames are supported
    #[cfg_attr(feature = "std", error("unsupported frame size {0}"))]
    UnsupportedFrameSize(u8),

    /// Only `N` (no parity) is supported
    #[cfg_attr(feature = "std", error("unsupported parity '{0}'"))]
    UnsupportedParity(char),

    /// Only 1 or 2 stop bits are supported
    #[cfg_attr(feature = "std", error("unsupported stop bit count {0}"))]
    UnsupportedStopBits(u8),

    /// Pin descriptor is malformed or the pin cannot be claimed
    #[cfg_attr(feature = "std", error("invalid GPIO pin"))]
    InvalidPin,

    /// Composite string carries a key this engine does not know
    #[cfg_attr(feature = "std", error("unknown parameter"))]
    UnknownParameter,

    /// Composite string lacks a required key
    #[cfg_attr(feature = "std", error("missing parameter '{0}'"))]
    MissingParameter(&'static str),

    /// The process-wide instance has already been constructed
    #[cfg_attr(feature = "std", error("instance already initialized"))]
    AlreadyInitialized,
}

#[cfg(not(feature = "std"))]
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("malformed parameter string"),
            Self::UnsupportedUnit(n) => write!(f, "unsupported UART unit {}", n),
            Self::UnsupportedBaudRate(b) => write!(f, "unsupported baud rate {}", b),
            Self::UnsupportedFrameSize(s) => write!(f, "unsupported frame size {}", s),
            Self::UnsupportedParity(p) => write!(f, "unsupported parity '{}'", p),
            Self::UnsupportedStopBits(s) => write!(f, "unsupported stop bit count {}", s),
            Self::InvalidPin => f.write_str("invalid GPIO pin"),
            Self::UnknownParameter => f.write_str("unknown parameter"),
            Self::MissingParameter(key) => write!(f, "missing parameter '{}'", key),
            Self::AlreadyInitialized => f.write_str("instance already initialized"),
        }
    }
}
