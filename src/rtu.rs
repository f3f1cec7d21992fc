//! # Modbus RTU Master Engine
//!
//! Half-duplex RTU transport over one [`Uart`] and one driver-enable pin.
//!
//! ## Transmit
//!
//! [`ModbusRtu::send_sync`] asserts the enable line (output, driven low),
//! writes the whole frame with [`IoFlags::SYNC_TXC`] so every byte has left
//! the shifter before the next is queued, then releases the line by
//! switching it back to input. The external pull-up returns the bus
//! transceiver to receive as soon as the last stop bit is out.
//!
//! ## Receive
//!
//! Two paths produce identical results for an identical byte stream:
//!
//! - [`ModbusRtu::recv_sync`] blocks until the frame is complete.
//! - [`ModbusRtu::recv_async`] advances an [`AsyncExchange`] by at most one
//!   non-blocking chunk read per call:
//!
//! ```text
//! Init -> Header -+-> Data -> Crc -> Completed
//!                 +---------> Crc -> Completed   (exception or empty payload)
//!                 +------------------> Completed (declared length too large)
//! ```
//!
//! `Err(nb::Error::WouldBlock)` means the exchange is incomplete; call again.
//! Once completed, further calls return the stored result without touching
//! the UART. There are no internal retries.

use core::convert::Infallible;

use static_cell::StaticCell;
use tracing::{debug, info, trace, warn};

use crate::config::ModbusRtuConfig;
use crate::constants::{DEFAULT_MODBUS_RTU_PARAMS, RTU_CRC_LEN, RTU_HEADER_LEN};
use crate::error::{ConfigError, ModbusError, ModbusResult};
use crate::gpio::{Direction, Gpio, GpioPort, PinState};
use crate::mem_chunk::MemChunk;
use crate::pdu::{function_code_description, ModbusRequest, ModbusResponse};
use crate::uart::{IoFlags, Uart, UartRegisters, UartUnit};

#[inline]
fn settle<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// RTU engine bound to a UART and a driver-enable pin
pub struct ModbusRtu<'a, R, P> {
    uart: Uart<'a, R>,
    enable: P,
    config: ModbusRtuConfig,
}

impl<'a, R: UartRegisters, P: Gpio> ModbusRtu<'a, R, P> {
    /// Parse `uart=...,de_port=...` and bring up both collaborators
    pub fn setup<G>(
        units: &'a [UartUnit<R>],
        gpio: &mut G,
        params: &str,
    ) -> Result<Self, ConfigError>
    where
        G: GpioPort<Pin = P>,
    {
        let config: ModbusRtuConfig = params.parse()?;
        Self::open(units, gpio, config)
    }

    /// Engine configured from [`DEFAULT_MODBUS_RTU_PARAMS`]
    pub fn setup_default<G>(units: &'a [UartUnit<R>], gpio: &mut G) -> Result<Self, ConfigError>
    where
        G: GpioPort<Pin = P>,
    {
        Self::setup(units, gpio, DEFAULT_MODBUS_RTU_PARAMS)
    }

    pub fn open<G>(
        units: &'a [UartUnit<R>],
        gpio: &mut G,
        config: ModbusRtuConfig,
    ) -> Result<Self, ConfigError>
    where
        G: GpioPort<Pin = P>,
    {
        let mut enable = gpio.claim(config.de_port).ok_or(ConfigError::InvalidPin)?;
        enable.set_direction(Direction::Input);

        let uart = Uart::open(units, config.uart)?;

        info!(
            "Modbus RTU ready on UART{}, DE on PORT{}:{}",
            config.uart.unit, config.de_port.port, config.de_port.bit
        );

        Ok(Self {
            uart,
            enable,
            config,
        })
    }

    pub fn config(&self) -> &ModbusRtuConfig {
        &self.config
    }

    /// Underlying UART, for draining or diagnostics
    pub fn uart(&mut self) -> &mut Uart<'a, R> {
        &mut self.uart
    }

    pub fn enable_pin(&self) -> &P {
        &self.enable
    }

    /// Transmit `request` with the enable line asserted
    ///
    /// The CRC is recomputed from the current fields first.
    pub fn send_sync(&mut self, request: &mut ModbusRequest<'_>) {
        let crc = request.update_crc();

        debug!(
            "TX slave={} FC={:02X} ({}) qty={} crc={:04X}",
            request.slave,
            request.function,
            function_code_description(request.function),
            request.quantity,
            crc
        );

        self.enable.set_direction(Direction::Output);
        self.enable.write(PinState::Low);

        for byte in request.bytes() {
            settle(nb::block!(self.uart.write_byte(byte, IoFlags::SYNC_TXC)));
        }

        // Last stop bit is out; hand the bus back
        self.enable.set_direction(Direction::Input);
    }

    /// Block until a complete response has been read into `response`
    pub fn recv_sync(&mut self, response: &mut ModbusResponse) -> ModbusResult<()> {
        response.clear();

        response.slave = self.read_sync();
        response.function = self.read_sync();

        if response.is_exception() {
            response.exception_code = self.read_sync();
        } else {
            let declared = self.read_sync();
            let payload = response.reserve_payload(declared).inspect_err(|e| {
                warn!("Response rejected: {}", e);
            })?;
            let mut chunk = MemChunk::new(payload);
            settle(nb::block!(self.uart.read_chunk(&mut chunk, IoFlags::empty())));
        }

        let lo = self.read_sync();
        let hi = self.read_sync();
        response.crc = u16::from_le_bytes([lo, hi]);

        finish_response(response)
    }

    /// Advance `exchange` by one non-blocking step
    pub fn recv_async(&mut self, exchange: &mut AsyncExchange) -> nb::Result<(), ModbusError> {
        exchange.poll(&mut self.uart)
    }

    fn read_sync(&mut self) -> u8 {
        settle(nb::block!(self.uart.read_byte(IoFlags::empty())))
    }
}

impl<R: UartRegisters + 'static, P: Gpio + 'static> ModbusRtu<'static, R, P> {
    /// Build the process-wide default engine inside `cell`
    ///
    /// Intended to run once during startup. The cell is claimed before any
    /// hardware is touched, so a second call fails with
    /// [`ConfigError::AlreadyInitialized`] and leaves the running instance
    /// alone. A setup failure also leaves the cell claimed.
    pub fn init_default<G>(
        cell: &'static StaticCell<Self>,
        units: &'static [UartUnit<R>],
        gpio: &mut G,
    ) -> Result<&'static mut Self, ConfigError>
    where
        G: GpioPort<Pin = P>,
    {
        let slot = cell.try_uninit().ok_or(ConfigError::AlreadyInitialized)?;
        let rtu = Self::setup_default(units, gpio)?;
        Ok(slot.write(rtu))
    }
}

fn finish_response(response: &ModbusResponse) -> ModbusResult<()> {
    match response.validate() {
        Ok(()) => {
            debug!(
                "RX slave={} FC={:02X} ({}) len={}",
                response.slave,
                response.function,
                function_code_description(response.function),
                response.payload().len()
            );
            Ok(())
        }
        Err(e) => {
            warn!("Response from slave {} dropped: {}", response.slave, e);
            Err(e)
        }
    }
}

/// Receive state of an [`AsyncExchange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AsyncState {
    Init,
    Header,
    Data,
    Crc,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Scratch,
    Payload,
}

/// Where the next chunk read lands and how far it has got
///
/// A [`MemChunk`] would borrow the scratch or payload buffer out of the
/// exchange that owns it. The cursor keeps `{target, length, progress}` by
/// value instead and each poll rebuilds the chunk with
/// [`MemChunk::with_progress`], so progress carries across polls unchanged.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    target: Target,
    length: usize,
    progress: usize,
}

impl Cursor {
    const fn new(target: Target, length: usize) -> Self {
        Self {
            target,
            length,
            progress: 0,
        }
    }
}

/// Resumable receive of one response frame
///
/// Discarding or [`restart`](Self::restart)ing an exchange is the only way
/// to cancel it. Bytes it already consumed are gone.
#[derive(Debug, Clone)]
pub struct AsyncExchange {
    state: AsyncState,
    scratch: [u8; RTU_HEADER_LEN],
    cursor: Cursor,
    response: ModbusResponse,
    result: Option<ModbusResult<()>>,
}

impl AsyncExchange {
    pub fn new() -> Self {
        Self {
            state: AsyncState::Init,
            scratch: [0; RTU_HEADER_LEN],
            cursor: Cursor::new(Target::Scratch, 0),
            response: ModbusResponse::new(),
            result: None,
        }
    }

    /// Drop all progress and start over at [`AsyncState::Init`]
    pub fn restart(&mut self) {
        self.state = AsyncState::Init;
        self.scratch = [0; RTU_HEADER_LEN];
        self.cursor = Cursor::new(Target::Scratch, 0);
        self.response.clear();
        self.result = None;
    }

    pub fn state(&self) -> AsyncState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == AsyncState::Completed
    }

    /// Response as received so far
    pub fn response(&self) -> &ModbusResponse {
        &self.response
    }

    /// Final outcome; `None` while incomplete
    pub fn result(&self) -> Option<ModbusResult<()>> {
        self.result
    }

    fn poll<R: UartRegisters>(&mut self, uart: &mut Uart<'_, R>) -> nb::Result<(), ModbusError> {
        match self.state {
            AsyncState::Completed => return self.stored_result(),
            AsyncState::Init => self.transit(AsyncState::Header),
            _ => {}
        }

        self.read_cursor(uart)?;

        match self.state {
            AsyncState::Header => self.on_header(),
            AsyncState::Data => self.transit(AsyncState::Crc),
            AsyncState::Crc => self.on_crc(),
            AsyncState::Init | AsyncState::Completed => {}
        }

        if self.is_completed() {
            self.stored_result()
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// One non-blocking chunk read on the active cursor
    fn read_cursor<R: UartRegisters>(
        &mut self,
        uart: &mut Uart<'_, R>,
    ) -> nb::Result<(), ModbusError> {
        let Cursor {
            target,
            length,
            progress,
        } = self.cursor;

        let region: &mut [u8] = match target {
            Target::Scratch => &mut self.scratch[..length],
            Target::Payload => &mut self.response.data[..length],
        };

        let mut chunk = MemChunk::with_progress(region, progress);
        let outcome = uart.read_chunk(&mut chunk, IoFlags::NONBLOCK);
        self.cursor.progress = chunk.progress();

        outcome.map_err(|e| match e {
            nb::Error::WouldBlock => nb::Error::WouldBlock,
            nb::Error::Other(never) => match never {},
        })
    }

    fn on_header(&mut self) {
        let [slave, function, third] = self.scratch;
        self.response.slave = slave;
        self.response.function = function;

        if self.response.is_exception() {
            self.response.exception_code = third;
            self.transit(AsyncState::Crc);
            return;
        }

        match self.response.reserve_payload(third).map(|payload| payload.len()) {
            Ok(0) => self.transit(AsyncState::Crc),
            Ok(_) => self.transit(AsyncState::Data),
            Err(e) => {
                warn!("Response rejected: {}", e);
                self.complete(Err(e));
            }
        }
    }

    fn on_crc(&mut self) {
        self.response.crc = u16::from_le_bytes([self.scratch[0], self.scratch[1]]);
        let result = finish_response(&self.response);
        self.complete(result);
    }

    fn transit(&mut self, next: AsyncState) {
        if self.state == next {
            return;
        }

        self.cursor = match next {
            AsyncState::Header => Cursor::new(Target::Scratch, RTU_HEADER_LEN),
            AsyncState::Data => Cursor::new(Target::Payload, self.response.data.len()),
            AsyncState::Crc => Cursor::new(Target::Scratch, RTU_CRC_LEN),
            AsyncState::Init | AsyncState::Completed => self.cursor,
        };

        trace!("Async receive {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn complete(&mut self, result: ModbusResult<()>) {
        trace!("Async receive {:?} -> Completed", self.state);
        self.state = AsyncState::Completed;
        self.result = Some(result);
    }

    fn stored_result(&self) -> nb::Result<(), ModbusError> {
        match self.result {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(nb::Error::Other(e)),
            None => Err(nb::Error::WouldBlock),
        }
    }
}

impl Default for AsyncExchange {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
