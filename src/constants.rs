//! Protocol and board constants
//!
//! Function codes follow the Modbus application protocol. Buffers are sized
//! for an ATmega2560 with 8 KiB of SRAM.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Fixed payload capacity of a [`ModbusResponse`](crate::pdu::ModbusResponse)
///
/// A response declaring more data bytes than this is rejected with
/// [`ModbusError::Capacity`](crate::error::ModbusError::Capacity).
pub const RESP_DATA_SIZE: usize = 32;

/// Bytes read before the engine knows the response layout:
/// slave address, function code, and byte count or exception code
pub const RTU_HEADER_LEN: usize = 3;

/// Trailing CRC16 length (low byte first on the wire)
pub const RTU_CRC_LEN: usize = 2;

/// Initial value of the CRC16/MODBUS register
pub const CRC16_INIT: u16 = 0xFFFF;

/// Reflected CRC16/MODBUS polynomial
pub const CRC16_POLY: u16 = 0xA001;

/// Function code bit that marks an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// UART Constants
// ============================================================================

/// Transmit ring buffer capacity per hardware unit
pub const UART_TX_FIFO_SIZE: usize = 16;

/// Receive ring buffer capacity per hardware unit
pub const UART_RX_FIFO_SIZE: usize = 16;

/// Number of USART units on the ATmega2560
pub const N_UART_UNITS: usize = 4;

/// CPU clock the baud divisor is computed against
pub const F_CPU: u32 = 16_000_000;

/// Baud rates accepted by [`UartConfig`](crate::config::UartConfig)
pub const SUPPORTED_BAUD_RATES: [u32; 17] = [
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200,
];

/// Console parameters used at bring-up
pub const CONSOLE_UART_PARAMS: &str = "UART0:115200@8N1";

/// Compiled-in parameters of the default Modbus RTU engine
pub const DEFAULT_MODBUS_RTU_PARAMS: &str = "uart=UART1:9600@8N1,de_port=PORTL:0";

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
