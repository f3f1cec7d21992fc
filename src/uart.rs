//! # Interrupt-Driven UART Driver
//!
//! Each physical USART is represented by a [`UartUnit`]: its control
//! registers plus one receive and one transmit [`RingBuffer`]. Units live in
//! a fixed, index-addressed table (see [`crate::atmega::USART_UNITS`]) and a
//! [`Uart`] handle selects one of them by the `unit` field of its
//! [`UartConfig`].
//!
//! ## Data Flow
//!
//! - **Receive**: the receive-complete interrupt moves one byte from the
//!   data register into the rx buffer. When the buffer is full the handler
//!   masks its own interrupt instead, leaving the byte in hardware; reads
//!   unmask it again once room exists.
//! - **Transmit (buffered)**: writes enqueue into the tx buffer and unmask the
//!   data-register-empty interrupt, whose handler pops one byte per
//!   invocation and masks itself once the buffer is drained.
//! - **Transmit (synchronous)**: with [`IoFlags::SYNC_TXC`] the buffer and
//!   interrupt are bypassed and each byte is busy-waited through to
//!   transmit-complete. The RTU engine relies on this to release its
//!   driver-enable line right after the last stop bit.
//!
//! Blocking calls spin with interrupts enabled so the awaited handler can
//! still run. Non-blocking calls sample once and return
//! [`nb::Error::WouldBlock`] after arming the relevant interrupt.

use core::convert::Infallible;
use core::fmt;

use bitflags::bitflags;
use tracing::info;

use crate::config::UartConfig;
use crate::constants::{UART_RX_FIFO_SIZE, UART_TX_FIFO_SIZE};
use crate::error::ConfigError;
use crate::mem_chunk::MemChunk;
use crate::ring_buffer::RingBuffer;

bitflags! {
    /// Per-call I/O behaviour
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IoFlags: u8 {
        /// Return `WouldBlock` instead of spinning
        const NONBLOCK = 0b001;
        /// CR becomes LF on input; LF is emitted as CR LF on output
        const TEXT_MODE = 0b010;
        /// Bypass the tx buffer and wait for transmit-complete per byte
        const SYNC_TXC = 0b100;
    }
}

bitflags! {
    /// Readiness events for [`Uart::poll`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PollEvents: u8 {
        /// A byte can be read without blocking
        const IN = 0b01;
        /// A byte can be written without blocking
        const OUT = 0b10;
    }
}

/// Control-register set of one USART
///
/// Implemented once per register layout; the driver never touches hardware
/// except through this trait.
pub trait UartRegisters {
    /// Reset control registers, program divisor and frame format, and
    /// enable the transmitter and receiver. Interrupts stay masked.
    fn configure(&self, config: &UartConfig, divisor: u16);

    fn set_rx_interrupt(&self, enabled: bool);
    fn set_tx_interrupt(&self, enabled: bool);

    /// Unread data waiting in the receive register
    fn is_receive_complete(&self) -> bool;
    /// Transmit data register can accept a byte
    fn is_data_register_empty(&self) -> bool;
    /// Last byte fully shifted out, stop bits included
    fn is_transmit_complete(&self) -> bool;
    fn clear_transmit_complete(&self);

    fn read_data(&self) -> u8;
    fn write_data(&self, byte: u8);
}

/// One hardware USART with its interrupt-side buffers
pub struct UartUnit<R> {
    regs: R,
    rx: RingBuffer<UART_RX_FIFO_SIZE>,
    tx: RingBuffer<UART_TX_FIFO_SIZE>,
}

impl<R> UartUnit<R> {
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
        }
    }

    /// Register set backing this unit
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Bytes received but not yet read
    pub fn rx_pending(&self) -> usize {
        self.rx.size()
    }

    /// Bytes queued but not yet handed to hardware
    pub fn tx_pending(&self) -> usize {
        self.tx.size()
    }
}

impl<R: UartRegisters> UartUnit<R> {
    /// Receive-complete interrupt handler
    #[inline]
    pub fn on_receive_complete(&self) {
        if self.rx.is_full() {
            self.regs.set_rx_interrupt(false);
        } else {
            let _ = self.rx.put(self.regs.read_data());
        }
    }

    /// Data-register-empty interrupt handler
    #[inline]
    pub fn on_data_register_empty(&self) {
        match self.tx.get() {
            Some(byte) => self.regs.write_data(byte),
            None => self.regs.set_tx_interrupt(false),
        }
    }
}

/// Foreground handle to a configured [`UartUnit`]
pub struct Uart<'a, R> {
    unit: &'a UartUnit<R>,
    config: UartConfig,
}

impl<'a, R: UartRegisters> Uart<'a, R> {
    /// Parse `params` and configure the selected unit
    pub fn setup(units: &'a [UartUnit<R>], params: &str) -> Result<Self, ConfigError> {
        let config: UartConfig = params.parse()?;
        Self::open(units, config)
    }

    /// Configure the unit selected by `config.unit`
    ///
    /// Safe to call again on a unit that is already running: both interrupts
    /// are masked before the registers and buffers are reset.
    pub fn open(units: &'a [UartUnit<R>], config: UartConfig) -> Result<Self, ConfigError> {
        let unit = units
            .get(config.unit as usize)
            .ok_or(ConfigError::UnsupportedUnit(config.unit))?;

        unit.regs.set_rx_interrupt(false);
        unit.regs.set_tx_interrupt(false);

        unit.rx.clear();
        unit.tx.clear();

        let divisor = config.default_baud_divisor();
        unit.regs.configure(&config, divisor);
        unit.regs.set_rx_interrupt(true);

        info!(
            "UART{} configured: {} baud, {} data bits, {} stop bits (divisor {})",
            config.unit, config.baud_rate, config.frame_size, config.stop_bits, divisor
        );

        Ok(Self { unit, config })
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    pub fn unit(&self) -> &'a UartUnit<R> {
        self.unit
    }

    /// Report which of `events` can proceed without blocking
    ///
    /// Interrupts for events that are not yet ready are armed so that
    /// progress continues in the background.
    pub fn poll(&self, events: PollEvents) -> PollEvents {
        let mut ready = PollEvents::empty();

        if events.contains(PollEvents::IN) {
            if self.unit.rx.is_empty() {
                self.unit.regs.set_rx_interrupt(true);
            } else {
                ready |= PollEvents::IN;
            }
        }

        if events.contains(PollEvents::OUT) {
            if self.unit.tx.is_full() {
                self.unit.regs.set_tx_interrupt(true);
            } else {
                ready |= PollEvents::OUT;
            }
        }

        ready
    }

    /// Spin until the tx buffer has been handed to hardware
    pub fn flush(&mut self) {
        self.unit.regs.set_tx_interrupt(true);
        while !self.unit.tx.is_empty() {
            core::hint::spin_loop();
        }
    }

    /// Read one byte
    pub fn read_byte(&mut self, flags: IoFlags) -> nb::Result<u8, Infallible> {
        let byte = loop {
            if let Some(byte) = self.unit.rx.get() {
                break byte;
            }

            self.unit.regs.set_rx_interrupt(true);
            if flags.contains(IoFlags::NONBLOCK) {
                return Err(nb::Error::WouldBlock);
            }

            while self.unit.rx.is_empty() {
                core::hint::spin_loop();
            }
        };

        // A slot was freed; lift receive backpressure
        self.unit.regs.set_rx_interrupt(true);

        if flags.contains(IoFlags::TEXT_MODE) && byte == b'\r' {
            Ok(b'\n')
        } else {
            Ok(byte)
        }
    }

    /// Write one byte
    pub fn write_byte(&mut self, byte: u8, flags: IoFlags) -> nb::Result<(), Infallible> {
        let newline = flags.contains(IoFlags::TEXT_MODE) && byte == b'\n';

        if flags.contains(IoFlags::SYNC_TXC) {
            self.unit.regs.set_tx_interrupt(false);

            // Earlier buffered output goes first to keep wire order
            while let Some(pending) = self.unit.tx.get() {
                self.write_sync(pending);
            }
            if newline {
                self.write_sync(b'\r');
            }
            self.write_sync(byte);
            return Ok(());
        }

        let nonblock = flags.contains(IoFlags::NONBLOCK);

        if newline {
            while self.unit.tx.put_pair(b'\r', b'\n').is_err() {
                if nonblock {
                    self.unit.regs.set_tx_interrupt(true);
                    return Err(nb::Error::WouldBlock);
                }
                self.flush();
            }
            self.unit.regs.set_tx_interrupt(true);

            // Line-buffered in blocking mode
            if !nonblock {
                self.flush();
            }
            return Ok(());
        }

        while self.unit.tx.put(byte).is_err() {
            if nonblock {
                self.unit.regs.set_tx_interrupt(true);
                return Err(nb::Error::WouldBlock);
            }
            self.flush();
        }
        self.unit.regs.set_tx_interrupt(true);

        Ok(())
    }

    /// Fill `chunk` from its current progress
    ///
    /// On `WouldBlock` the chunk keeps every byte read so far; call again
    /// with the same chunk to continue.
    pub fn read_chunk<B>(
        &mut self,
        chunk: &mut MemChunk<B>,
        flags: IoFlags,
    ) -> nb::Result<(), Infallible>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        while !chunk.is_complete() {
            let byte = self.read_byte(flags)?;
            chunk.fill(byte);
        }
        Ok(())
    }

    /// Send `chunk` from its current progress
    ///
    /// Blocking buffered writes are flushed before returning.
    pub fn write_chunk<B>(
        &mut self,
        chunk: &mut MemChunk<B>,
        flags: IoFlags,
    ) -> nb::Result<(), Infallible>
    where
        B: AsRef<[u8]>,
    {
        while let Some(byte) = chunk.current() {
            self.write_byte(byte, flags)?;
            chunk.advance();
        }

        if !flags.intersects(IoFlags::NONBLOCK | IoFlags::SYNC_TXC) {
            self.flush();
        }

        Ok(())
    }

    /// Read one console line into `buf`, blocking
    ///
    /// Text mode applies, so a CR from a terminal ends the line as LF. Stops
    /// after the LF, which is stored, or once `buf` is full. Returns the
    /// number of bytes stored.
    pub fn read_line(&mut self, buf: &mut [u8]) -> usize {
        let mut line = MemChunk::new(buf);

        while !line.is_complete() {
            let byte = match nb::block!(self.read_byte(IoFlags::TEXT_MODE)) {
                Ok(byte) => byte,
                Err(never) => match never {},
            };
            line.fill(byte);
            if byte == b'\n' {
                break;
            }
        }

        line.progress()
    }

    /// Put one byte on the wire and wait until it has left the shifter
    fn write_sync(&self, byte: u8) {
        let regs = &self.unit.regs;

        while !regs.is_data_register_empty() {
            core::hint::spin_loop();
        }

        regs.clear_transmit_complete();
        regs.write_data(byte);

        while !regs.is_transmit_complete() {
            core::hint::spin_loop();
        }
    }
}

/// Console output: text mode, blocking
impl<R: UartRegisters> fmt::Write for Uart<'_, R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            nb::block!(self.write_byte(byte, IoFlags::TEXT_MODE))
                .map_err(|e: Infallible| -> fmt::Error { match e {} })?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
