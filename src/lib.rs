//! # AVR Modbus RTU - Interrupt-Driven Serial Stack
//!
//! A Modbus RTU master transport for ATmega-class microcontrollers, built on
//! an interrupt-fed UART driver and a millisecond system clock.
//!
//! ## Features
//!
//! - **Interrupt-driven UART**: per-unit rx/tx ring buffers filled and drained
//!   by interrupt handlers, with blocking and non-blocking byte and chunk I/O
//! - **Backpressure, not errors**: non-blocking calls return
//!   [`nb::Error::WouldBlock`] and re-arm the relevant interrupt
//! - **Resumable transfers**: [`MemChunk`] carries partial progress across
//!   repeated non-blocking calls
//! - **Modbus RTU engine**: CRC16/MODBUS framing, half-duplex driver-enable
//!   control, synchronous receive and a pollable [`AsyncExchange`]
//! - **`no_std`**: no heap; the `std` feature adds a hosted simulation of the
//!   hardware for tests
//!
//! ## Execution Model
//!
//! One foreground context plus interrupt handlers. State shared between them
//! (clock time, ring-buffer contents) lives behind [`critical_section`]
//! mutexes. Blocking calls spin with interrupts enabled.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use avr_modbus_rtu::sim::{self, SimGpio, SimUsart};
//! use avr_modbus_rtu::{AsyncExchange, ModbusRequest, ModbusRtu, UartUnit};
//!
//! let units = [UartUnit::new(SimUsart::new()), UartUnit::new(SimUsart::new())];
//! let mut gpio = SimGpio::new();
//! let mut rtu = ModbusRtu::setup(&units, &mut gpio, "uart=UART1:9600@8N1,de_port=PORTL:0")?;
//!
//! // Read ten holding registers from slave 0x11
//! rtu.send_sync(&mut ModbusRequest::new(0x11, 0x03, 0x000A));
//!
//! let mut exchange = AsyncExchange::new();
//! loop {
//!     sim::service_until_idle(&units[1]);
//!     match rtu.recv_async(&mut exchange) {
//!         Err(nb::Error::WouldBlock) => continue,
//!         Err(nb::Error::Other(e)) => return Err(e.into()),
//!         Ok(()) => break,
//!     }
//! }
//! println!("payload: {:02X?}", exchange.response().payload());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

// ============================================================================
// Core modules
// ============================================================================

/// Error types and result aliases
pub mod error;

/// Protocol and board constants
pub mod constants;

/// Parameter string parsing
pub mod config;

/// Millisecond system clock
pub mod clock;

/// Deadlines measured against the clock
pub mod timer;

/// Interrupt-safe byte FIFO
pub mod ring_buffer;

/// Resumable cursor over a byte region
pub mod mem_chunk;

/// GPIO collaborator traits
pub mod gpio;

/// Interrupt-driven UART driver
pub mod uart;

/// Request and response frames with CRC16
pub mod pdu;

/// Modbus RTU master engine
pub mod rtu;

// ============================================================================
// Hardware bindings
// ============================================================================

/// ATmega2560 USART and Timer0 registers
pub mod atmega;

/// Hosted hardware simulation
#[cfg(feature = "std")]
pub mod sim;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Error handling ===
pub use error::{ConfigError, ModbusError, ModbusResult};

// === Configuration ===
pub use config::{ModbusRtuConfig, Parity, PinId, UartConfig};

// === Time ===
pub use clock::{Clock, ClockTime, TickTimer};
pub use timer::Deadline;

// === Transport ===
pub use mem_chunk::MemChunk;
pub use ring_buffer::RingBuffer;
pub use uart::{IoFlags, PollEvents, Uart, UartRegisters, UartUnit};

// === GPIO ===
pub use gpio::{Direction, Gpio, GpioPort, PinState};

// === Modbus RTU ===
pub use pdu::{crc16, ModbusRequest, ModbusResponse};
pub use rtu::{AsyncExchange, AsyncState, ModbusRtu};

// === Commonly needed constants ===
pub use constants::{CONSOLE_UART_PARAMS, DEFAULT_MODBUS_RTU_PARAMS, RESP_DATA_SIZE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
