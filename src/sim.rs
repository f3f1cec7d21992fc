//! Hosted stand-ins for the USART and GPIO hardware
//!
//! [`SimUsart`] models one USART register set: bytes injected on the
//! inbound line appear in the receive register, bytes written to the data
//! register are captured, and interrupt-enable bits are plain flags. There is
//! no interrupt controller on the host, so [`service`] plays its part: it
//! calls whichever handlers are enabled and have their condition raised.
//! [`with_interrupts`] keeps doing that on a scoped thread so blocking
//! driver calls can complete.
//!
//! [`SimGpio`] hands out [`SimPin`]s that log every direction and level
//! change for later inspection.

use core::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use critical_section::Mutex;

use crate::config::{PinId, UartConfig};
use crate::gpio::{Direction, Gpio, GpioPort, PinState};
use crate::uart::{UartRegisters, UartUnit};

struct LineState {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    loopback: bool,
    rx_interrupt: bool,
    tx_interrupt: bool,
    transmit_complete: bool,
    configuration: Option<(UartConfig, u16)>,
}

/// Simulated USART register set
pub struct SimUsart {
    state: Mutex<RefCell<LineState>>,
}

impl SimUsart {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(LineState {
                inbound: VecDeque::new(),
                outbound: Vec::new(),
                loopback: false,
                rx_interrupt: false,
                tx_interrupt: false,
                transmit_complete: true,
                configuration: None,
            })),
        }
    }

    /// USART whose transmitter is wired to its own receiver
    pub fn loopback() -> Self {
        let usart = Self::new();
        usart.set_loopback(true);
        usart
    }

    fn with<T>(&self, f: impl FnOnce(&mut LineState) -> T) -> T {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    pub fn set_loopback(&self, enabled: bool) {
        self.with(|s| s.loopback = enabled);
    }

    /// Queue bytes as if sent by the peer
    pub fn inject(&self, bytes: &[u8]) {
        self.with(|s| s.inbound.extend(bytes.iter().copied()));
    }

    /// Bytes waiting in hardware, not yet moved to the rx buffer
    pub fn pending_input(&self) -> usize {
        self.with(|s| s.inbound.len())
    }

    /// Everything put on the wire so far
    pub fn transmitted(&self) -> Vec<u8> {
        self.with(|s| s.outbound.clone())
    }

    /// Drain and return everything put on the wire so far
    pub fn take_transmitted(&self) -> Vec<u8> {
        self.with(|s| core::mem::take(&mut s.outbound))
    }

    pub fn rx_interrupt_enabled(&self) -> bool {
        self.with(|s| s.rx_interrupt)
    }

    pub fn tx_interrupt_enabled(&self) -> bool {
        self.with(|s| s.tx_interrupt)
    }

    /// Last programmed settings and divisor
    pub fn configuration(&self) -> Option<(UartConfig, u16)> {
        self.with(|s| s.configuration)
    }
}

impl Default for SimUsart {
    fn default() -> Self {
        Self::new()
    }
}

impl UartRegisters for SimUsart {
    fn configure(&self, config: &UartConfig, divisor: u16) {
        self.with(|s| {
            s.rx_interrupt = false;
            s.tx_interrupt = false;
            s.transmit_complete = true;
            s.configuration = Some((*config, divisor));
        });
    }

    fn set_rx_interrupt(&self, enabled: bool) {
        self.with(|s| s.rx_interrupt = enabled);
    }

    fn set_tx_interrupt(&self, enabled: bool) {
        self.with(|s| s.tx_interrupt = enabled);
    }

    fn is_receive_complete(&self) -> bool {
        self.with(|s| !s.inbound.is_empty())
    }

    // The simulated shifter is instantaneous
    fn is_data_register_empty(&self) -> bool {
        true
    }

    fn is_transmit_complete(&self) -> bool {
        self.with(|s| s.transmit_complete)
    }

    fn clear_transmit_complete(&self) {
        self.with(|s| s.transmit_complete = false);
    }

    fn read_data(&self) -> u8 {
        self.with(|s| s.inbound.pop_front().unwrap_or(0))
    }

    fn write_data(&self, byte: u8) {
        self.with(|s| {
            s.outbound.push(byte);
            if s.loopback {
                s.inbound.push_back(byte);
            }
            s.transmit_complete = true;
        });
    }
}

/// Run every enabled handler whose condition is raised, once
///
/// Returns whether any handler ran.
pub fn service(unit: &UartUnit<SimUsart>) -> bool {
    let regs = unit.regs();
    let mut fired = false;

    if regs.rx_interrupt_enabled() && regs.is_receive_complete() {
        unit.on_receive_complete();
        fired = true;
    }
    if regs.tx_interrupt_enabled() && regs.is_data_register_empty() {
        unit.on_data_register_empty();
        fired = true;
    }

    fired
}

/// [`service`] until no handler fires; returns the number of passes
pub fn service_until_idle(unit: &UartUnit<SimUsart>) -> usize {
    let mut passes = 0;
    while service(unit) {
        passes += 1;
    }
    passes
}

/// Raises the stop flag even when the foreground closure panics
struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Run `f` while a scoped thread services `unit`'s interrupts
pub fn with_interrupts<T>(unit: &UartUnit<SimUsart>, f: impl FnOnce() -> T) -> T {
    let stop = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            while !stop.load(Ordering::Acquire) {
                if !service(unit) {
                    std::thread::yield_now();
                }
            }
        });

        let _stop = StopOnDrop(&stop);
        f()
    })
}

/// Recorded pin change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    Direction(Direction),
    Level(PinState),
}

/// Simulated GPIO port
pub struct SimGpio {
    available: bool,
}

impl SimGpio {
    /// Port on which every valid pin can be claimed
    pub fn new() -> Self {
        Self { available: true }
    }

    /// Port that refuses every claim
    pub fn without_pins() -> Self {
        Self { available: false }
    }
}

impl Default for SimGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioPort for SimGpio {
    type Pin = SimPin;

    fn claim(&mut self, id: PinId) -> Option<SimPin> {
        self.available.then(|| SimPin::new(id))
    }
}

/// Simulated pin on a line with an external pull-up
#[derive(Debug, Clone)]
pub struct SimPin {
    id: PinId,
    direction: Direction,
    level: PinState,
    events: Arc<StdMutex<Vec<PinEvent>>>,
}

impl SimPin {
    pub fn new(id: PinId) -> Self {
        Self {
            id,
            direction: Direction::Input,
            level: PinState::Low,
            events: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> PinId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Changes recorded since the last [`clear_events`](Self::clear_events)
    pub fn events(&self) -> Vec<PinEvent> {
        self.events.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn clear_events(&self) {
        if let Ok(mut log) = self.events.lock() {
            log.clear();
        }
    }

    fn record(&self, event: PinEvent) {
        if let Ok(mut log) = self.events.lock() {
            log.push(event);
        }
    }
}

impl Gpio for SimPin {
    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.record(PinEvent::Direction(direction));
    }

    fn write(&mut self, state: PinState) {
        self.level = state;
        self.record(PinEvent::Level(state));
    }

    fn read(&self) -> PinState {
        match self.direction {
            Direction::Input => PinState::High,
            Direction::Output => self.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_echoes_writes() {
        let usart = SimUsart::loopback();
        usart.write_data(0x5A);
        assert!(usart.is_receive_complete());
        assert_eq!(usart.read_data(), 0x5A);
        assert_eq!(usart.take_transmitted(), [0x5A]);
        assert!(usart.transmitted().is_empty());
    }

    #[test]
    fn test_service_respects_enable_flags() {
        let unit = UartUnit::new(SimUsart::new());
        unit.regs().inject(&[1, 2]);
        assert!(!service(&unit));
        assert_eq!(unit.rx_pending(), 0);

        unit.regs().set_rx_interrupt(true);
        assert_eq!(service_until_idle(&unit), 2);
        assert_eq!(unit.rx_pending(), 2);
    }

    #[test]
    fn test_pin_reads_pull_up_when_released() {
        let mut pin = SimGpio::new().claim("PORTL:0".parse().unwrap()).unwrap();
        assert_eq!(pin.read(), PinState::High);

        pin.set_direction(Direction::Output);
        pin.write(PinState::Low);
        assert_eq!(pin.read(), PinState::Low);

        pin.set_direction(Direction::Input);
        assert_eq!(pin.read(), PinState::High);
        assert_eq!(pin.events().len(), 3);
        assert_eq!(pin.id(), PinId::new('L', 0).unwrap());
    }
}
