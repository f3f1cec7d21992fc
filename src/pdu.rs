//! Modbus RTU request and response frames
//!
//! Both frame types are plain values with no heap use: requests borrow their
//! optional payload, responses carry a fixed buffer of [`RESP_DATA_SIZE`]
//! bytes that is reused across polls of one exchange.
//!
//! The CRC is always accumulated over the fields in wire order, so the
//! synchronous and asynchronous receive paths validate identically.

use crc::{Crc, CRC_16_MODBUS};
use heapless::Vec;

use crate::constants::{
    EXCEPTION_FLAG, FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS,
    FC_READ_INPUT_REGISTERS, FC_WRITE_MULTIPLE_COILS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, RESP_DATA_SIZE,
};
use crate::error::{ModbusError, ModbusResult};

/// CRC16/MODBUS engine (poly 0xA001 reflected, init 0xFFFF)
pub static MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC16/MODBUS of `bytes`
#[inline]
pub fn crc16(bytes: &[u8]) -> u16 {
    MODBUS_CRC.checksum(bytes)
}

/// Outgoing request frame
///
/// Serialized as address, function code, optional data, quantity (big
/// endian), CRC (little endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusRequest<'a> {
    pub slave: u8,
    pub function: u8,
    pub data: Option<&'a [u8]>,
    pub quantity: u16,
    crc: u16,
}

impl<'a> ModbusRequest<'a> {
    /// Request without data bytes
    pub fn new(slave: u8, function: u8, quantity: u16) -> Self {
        let mut request = Self {
            slave,
            function,
            data: None,
            quantity,
            crc: 0,
        };
        request.update_crc();
        request
    }

    /// Request whose data bytes precede the quantity field
    pub fn with_data(slave: u8, function: u8, data: &'a [u8], quantity: u16) -> Self {
        let mut request = Self {
            slave,
            function,
            data: Some(data),
            quantity,
            crc: 0,
        };
        request.update_crc();
        request
    }

    /// CRC over the current field values
    pub fn compute_crc(&self) -> u16 {
        let mut digest = MODBUS_CRC.digest();
        digest.update(&[self.slave, self.function]);
        digest.update(self.data.unwrap_or(&[]));
        digest.update(&self.quantity.to_be_bytes());
        digest.finalize()
    }

    /// Recompute and store the CRC; call after editing fields
    pub fn update_crc(&mut self) -> u16 {
        self.crc = self.compute_crc();
        self.crc
    }

    /// CRC as last computed
    #[inline]
    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// Frame length on the wire
    pub fn frame_len(&self) -> usize {
        2 + self.data.map_or(0, <[u8]>::len) + 2 + 2
    }

    /// Frame bytes in wire order
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        [self.slave, self.function]
            .into_iter()
            .chain(self.data.unwrap_or(&[]).iter().copied())
            .chain(self.quantity.to_be_bytes())
            .chain(self.crc.to_le_bytes())
    }
}

/// Incoming response frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModbusResponse {
    pub slave: u8,
    pub function: u8,
    /// Meaningful only when [`is_exception`](Self::is_exception)
    pub exception_code: u8,
    pub data: Vec<u8, RESP_DATA_SIZE>,
    /// CRC as received
    pub crc: u16,
}

impl ModbusResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every field for reuse
    pub fn clear(&mut self) {
        self.slave = 0;
        self.function = 0;
        self.exception_code = 0;
        self.data.clear();
        self.crc = 0;
    }

    /// True when the function code carries the exception bit
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function & EXCEPTION_FLAG != 0
    }

    /// Exception code of an exception response
    pub fn exception(&self) -> Option<u8> {
        self.is_exception().then_some(self.exception_code)
    }

    /// Received data bytes
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// CRC recomputed over the received fields
    pub fn expected_crc(&self) -> u16 {
        let mut digest = MODBUS_CRC.digest();
        digest.update(&[self.slave, self.function]);
        if self.is_exception() {
            digest.update(&[self.exception_code]);
        } else {
            digest.update(&[self.data.len() as u8]);
            digest.update(&self.data);
        }
        digest.finalize()
    }

    /// Compare the received CRC against the recomputed one
    pub fn validate(&self) -> ModbusResult<()> {
        let expected = self.expected_crc();
        if expected == self.crc {
            Ok(())
        } else {
            Err(ModbusError::Crc {
                expected,
                received: self.crc,
            })
        }
    }

    /// Size the payload buffer for a declared byte count
    pub(crate) fn reserve_payload(&mut self, declared: u8) -> ModbusResult<&mut [u8]> {
        let declared = declared as usize;
        self.data
            .resize(declared, 0)
            .map_err(|_| ModbusError::Capacity {
                declared,
                capacity: RESP_DATA_SIZE,
            })?;
        Ok(self.data.as_mut_slice())
    }
}

/// Human-readable function code for log output
pub fn function_code_description(fc: u8) -> &'static str {
    match fc & !EXCEPTION_FLAG {
        FC_READ_COILS => "Read Coils",
        FC_READ_DISCRETE_INPUTS => "Read Discrete Inputs",
        FC_READ_HOLDING_REGISTERS => "Read Holding Registers",
        FC_READ_INPUT_REGISTERS => "Read Input Registers",
        FC_WRITE_SINGLE_COIL => "Write Single Coil",
        FC_WRITE_SINGLE_REGISTER => "Write Single Register",
        FC_WRITE_MULTIPLE_COILS => "Write Multiple Coils",
        FC_WRITE_MULTIPLE_REGISTERS => "Write Multiple Registers",
        _ => "Unknown Function",
    }
}
