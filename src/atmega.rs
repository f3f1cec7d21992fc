//! # ATmega2560 Register Bindings
//!
//! Memory-mapped access to the four USART units and Timer0, plus the static
//! unit table and system clock the drivers run on. Only firmware builds
//! touch these addresses; hosted builds use [`crate::sim`] instead.
//!
//! The board crate wires the interrupt vectors to the handlers below:
//!
//! | Vector | Handler |
//! |--------|---------|
//! | `USART0_RX` .. `USART3_RX` | [`usart_rx_isr`] with the unit index |
//! | `USART0_UDRE` .. `USART3_UDRE` | [`usart_udre_isr`] with the unit index |
//! | `TIMER0_COMPA` | [`timer0_compa_isr`] |

use core::ptr::{read_volatile, write_volatile};

use crate::clock::{Clock, TickTimer};
use crate::config::UartConfig;
use crate::constants::{F_CPU, N_UART_UNITS};
use crate::uart::{UartRegisters, UartUnit};

/// UCSRnA bits
mod ucsra {
    pub const RXC: u8 = 1 << 7;
    pub const TXC: u8 = 1 << 6;
    pub const UDRE: u8 = 1 << 5;
}

/// UCSRnB bits
mod ucsrb {
    pub const RXCIE: u8 = 1 << 7;
    pub const UDRIE: u8 = 1 << 5;
    pub const RXEN: u8 = 1 << 4;
    pub const TXEN: u8 = 1 << 3;
}

/// UCSRnC bits
mod ucsrc {
    pub const USBS: u8 = 1 << 3;
    pub const UCSZ1: u8 = 1 << 2;
    pub const UCSZ0: u8 = 1 << 1;
}

/// Timer0 registers and bits
mod timer0 {
    pub const TCCR0A: usize = 0x44;
    pub const TCCR0B: usize = 0x45;
    pub const TCNT0: usize = 0x46;
    pub const OCR0A: usize = 0x47;
    pub const TIMSK0: usize = 0x6E;

    pub const WGM01: u8 = 1 << 1;
    pub const CS01: u8 = 1 << 1;
    pub const CS00: u8 = 1 << 0;
    pub const OCIE0A: u8 = 1 << 1;
}

#[inline(always)]
fn reg_read(addr: usize) -> u8 {
    // SAFETY: `addr` is one of the fixed data-space I/O register addresses
    // declared in this module
    unsafe { read_volatile(addr as *const u8) }
}

#[inline(always)]
fn reg_write(addr: usize, value: u8) {
    // SAFETY: as for `reg_read`
    unsafe { write_volatile(addr as *mut u8, value) }
}

/// Read-modify-write shielded from interrupts touching the same register
#[inline]
fn reg_modify(addr: usize, f: impl FnOnce(u8) -> u8) {
    critical_section::with(|_| reg_write(addr, f(reg_read(addr))));
}

/// UCSRnC value for `config`: asynchronous mode, no parity
pub const fn frame_format(config: &UartConfig) -> u8 {
    let size = match config.frame_size {
        7 => ucsrc::UCSZ1,
        _ => ucsrc::UCSZ1 | ucsrc::UCSZ0,
    };
    let stop = if config.stop_bits == 2 { ucsrc::USBS } else { 0 };
    size | stop
}

/// Register block of one USART unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usart {
    ucsra: usize,
    ucsrb: usize,
    ucsrc: usize,
    ubrrl: usize,
    ubrrh: usize,
    udr: usize,
}

impl Usart {
    const fn at(base: usize) -> Self {
        Self {
            ucsra: base,
            ucsrb: base + 1,
            ucsrc: base + 2,
            ubrrl: base + 4,
            ubrrh: base + 5,
            udr: base + 6,
        }
    }

    pub const USART0: Self = Self::at(0xC0);
    pub const USART1: Self = Self::at(0xC8);
    pub const USART2: Self = Self::at(0xD0);
    pub const USART3: Self = Self::at(0x130);

    /// Data register address
    pub const fn data_register(&self) -> usize {
        self.udr
    }
}

impl UartRegisters for Usart {
    fn configure(&self, config: &UartConfig, divisor: u16) {
        reg_write(self.ucsrb, 0);
        reg_write(self.ucsra, 0);
        reg_write(self.ucsrc, frame_format(config));

        // UBRRnL write latches the full divisor
        let [hi, lo] = divisor.to_be_bytes();
        reg_write(self.ubrrh, hi & 0x0F);
        reg_write(self.ubrrl, lo);

        reg_write(self.ucsrb, ucsrb::RXEN | ucsrb::TXEN);
    }

    fn set_rx_interrupt(&self, enabled: bool) {
        reg_modify(self.ucsrb, |v| {
            if enabled {
                v | ucsrb::RXCIE
            } else {
                v & !ucsrb::RXCIE
            }
        });
    }

    fn set_tx_interrupt(&self, enabled: bool) {
        reg_modify(self.ucsrb, |v| {
            if enabled {
                v | ucsrb::UDRIE
            } else {
                v & !ucsrb::UDRIE
            }
        });
    }

    #[inline]
    fn is_receive_complete(&self) -> bool {
        reg_read(self.ucsra) & ucsra::RXC != 0
    }

    #[inline]
    fn is_data_register_empty(&self) -> bool {
        reg_read(self.ucsra) & ucsra::UDRE != 0
    }

    #[inline]
    fn is_transmit_complete(&self) -> bool {
        reg_read(self.ucsra) & ucsra::TXC != 0
    }

    // TXC is write-one-to-clear
    #[inline]
    fn clear_transmit_complete(&self) {
        reg_write(self.ucsra, ucsra::TXC);
    }

    #[inline]
    fn read_data(&self) -> u8 {
        reg_read(self.udr)
    }

    #[inline]
    fn write_data(&self, byte: u8) {
        reg_write(self.udr, byte);
    }
}

/// Index-selected table of the on-chip USART units
pub static USART_UNITS: [UartUnit<Usart>; N_UART_UNITS] = [
    UartUnit::new(Usart::USART0),
    UartUnit::new(Usart::USART1),
    UartUnit::new(Usart::USART2),
    UartUnit::new(Usart::USART3),
];

/// System millisecond clock, advanced by [`timer0_compa_isr`]
pub static CLOCK: Clock = Clock::new();

/// Timer0 in CTC mode as the 1 ms tick source
pub struct Timer0;

impl Timer0 {
    pub const PRESCALER: u32 = 64;

    /// OCR0A for a 1 kHz compare match
    pub const COMPARE_VALUE: u8 = (F_CPU / Self::PRESCALER / 1000 - 1) as u8;
}

impl TickTimer for Timer0 {
    fn start_millisecond_tick(&mut self) {
        reg_write(timer0::TCCR0B, 0);
        reg_write(timer0::TCCR0A, timer0::WGM01);
        reg_write(timer0::TCNT0, 0);
        reg_write(timer0::OCR0A, Self::COMPARE_VALUE);
        reg_modify(timer0::TIMSK0, |v| v | timer0::OCIE0A);
        reg_write(timer0::TCCR0B, timer0::CS01 | timer0::CS00);
    }
}

/// `USARTn_RX` vector body
#[inline(always)]
pub fn usart_rx_isr(unit: usize) {
    if let Some(unit) = USART_UNITS.get(unit) {
        unit.on_receive_complete();
    }
}

/// `USARTn_UDRE` vector body
#[inline(always)]
pub fn usart_udre_isr(unit: usize) {
    if let Some(unit) = USART_UNITS.get(unit) {
        unit.on_data_register_empty();
    }
}

/// `TIMER0_COMPA` vector body
#[inline(always)]
pub fn timer0_compa_isr() {
    CLOCK.on_tick();
}
