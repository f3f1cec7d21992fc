//! Millisecond system clock
//!
//! The clock is advanced by a 1 ms periodic timer interrupt that calls
//! [`Clock::on_tick`]. That handler is the only writer; every other access
//! goes through [`Clock::snapshot`], which copies the time inside a critical
//! section so a tick can never be observed half-applied.
//!
//! The seconds counter is 32 bits wide, which bounds the usable horizon to
//! roughly 136 years of uptime. Wrap-around is not handled.

use core::cell::Cell;
use core::cmp::Ordering;

use critical_section::Mutex;

/// Point in time (or interval) since clock start
///
/// Field order matters: the derived ordering compares seconds first,
/// then milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockTime {
    /// Whole seconds
    pub seconds: u32,
    /// Milliseconds within the current second, always below 1000
    pub millis: u16,
}

impl ClockTime {
    /// Time zero
    pub const ZERO: Self = Self {
        seconds: 0,
        millis: 0,
    };

    /// Build from seconds and milliseconds, carrying excess milliseconds
    pub const fn new(seconds: u32, millis: u16) -> Self {
        Self {
            seconds: seconds + (millis / 1000) as u32,
            millis: millis % 1000,
        }
    }

    /// Split a millisecond count into seconds and milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self {
            seconds: (ms / 1000) as u32,
            millis: (ms % 1000) as u16,
        }
    }

    /// Total milliseconds
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.seconds as u64 * 1000 + self.millis as u64
    }

    /// Absolute distance between two times in milliseconds
    pub fn elapsed(a: &Self, b: &Self) -> u64 {
        a.as_millis().abs_diff(b.as_millis())
    }

    /// Lexicographic comparison on (seconds, milliseconds)
    pub fn compare(a: &Self, b: &Self) -> Ordering {
        a.cmp(b)
    }

    /// Advance by one millisecond, rolling milliseconds into seconds
    #[inline]
    fn tick(&mut self) {
        if self.millis == 999 {
            self.millis = 0;
            self.seconds = self.seconds.wrapping_add(1);
        } else {
            self.millis += 1;
        }
    }
}

/// Hardware timer able to raise a periodic 1 ms interrupt
pub trait TickTimer {
    /// Program the timer and unmask its compare interrupt
    fn start_millisecond_tick(&mut self);
}

/// Interrupt-driven millisecond counter
pub struct Clock {
    time: Mutex<Cell<ClockTime>>,
    ready: Mutex<Cell<bool>>,
}

impl Clock {
    /// Create a stopped clock at time zero
    pub const fn new() -> Self {
        Self {
            time: Mutex::new(Cell::new(ClockTime::ZERO)),
            ready: Mutex::new(Cell::new(false)),
        }
    }

    /// Arm the tick source; calls after the first one are ignored
    pub fn initialize<T: TickTimer>(&self, timer: &mut T) {
        let first = critical_section::with(|cs| {
            let ready = self.ready.borrow(cs);
            if ready.get() {
                false
            } else {
                timer.start_millisecond_tick();
                ready.set(true);
                true
            }
        });

        if first {
            tracing::debug!("Clock tick armed");
        }
    }

    /// Whether [`initialize`](Self::initialize) has run
    pub fn is_initialized(&self) -> bool {
        critical_section::with(|cs| self.ready.borrow(cs).get())
    }

    /// Race-free copy of the current time
    #[inline]
    pub fn snapshot(&self) -> ClockTime {
        critical_section::with(|cs| self.time.borrow(cs).get())
    }

    /// Tick interrupt handler
    #[inline]
    pub fn on_tick(&self) {
        critical_section::with(|cs| {
            let cell = self.time.borrow(cs);
            let mut now = cell.get();
            now.tick();
            cell.set(now);
        });
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingTimer {
        starts: usize,
    }

    impl TickTimer for CountingTimer {
        fn start_millisecond_tick(&mut self) {
            self.starts += 1;
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let clock = Clock::new();
        let mut timer = CountingTimer { starts: 0 };

        assert!(!clock.is_initialized());
        clock.initialize(&mut timer);
        clock.initialize(&mut timer);
        clock.initialize(&mut timer);

        assert!(clock.is_initialized());
        assert_eq!(timer.starts, 1);
    }

    #[test]
    fn test_thousand_ticks_roll_into_one_second() {
        let clock = Clock::new();
        for _ in 0..999 {
            clock.on_tick();
        }
        assert_eq!(clock.snapshot(), ClockTime::new(0, 999));

        clock.on_tick();
        assert_eq!(clock.snapshot(), ClockTime::new(1, 0));
    }

    #[test]
    fn test_compare_orders_seconds_first() {
        let a = ClockTime::new(1, 900);
        let b = ClockTime::new(2, 100);

        assert_eq!(ClockTime::compare(&a, &b), Ordering::Less);
        assert_eq!(ClockTime::compare(&b, &a), Ordering::Greater);
        assert_eq!(ClockTime::compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_compare_milliseconds_when_seconds_equal() {
        let a = ClockTime::new(5, 10);
        let b = ClockTime::new(5, 20);

        assert_eq!(ClockTime::compare(&a, &b), Ordering::Less);
        assert_eq!(ClockTime::compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_elapsed_is_symmetric() {
        let a = ClockTime::new(1, 900);
        let b = ClockTime::new(3, 50);

        assert_eq!(ClockTime::elapsed(&a, &b), 1150);
        assert_eq!(ClockTime::elapsed(&b, &a), 1150);
        assert_eq!(ClockTime::elapsed(&a, &a), 0);
    }

    #[test]
    fn test_millis_conversion() {
        let t = ClockTime::from_millis(12_345);
        assert_eq!(t, ClockTime::new(12, 345));
        assert_eq!(t.as_millis(), 12_345);
        assert_eq!(ClockTime::new(0, 2500), ClockTime::new(2, 500));
    }

    proptest::proptest! {
        #[test]
        fn prop_compare_consistent_with_elapsed(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let x = ClockTime::from_millis(a);
            let y = ClockTime::from_millis(b);

            // Antisymmetric
            proptest::prop_assert_eq!(
                ClockTime::compare(&x, &y),
                ClockTime::compare(&y, &x).reverse()
            );
            // Equal iff no distance between them
            proptest::prop_assert_eq!(
                ClockTime::compare(&x, &y) == Ordering::Equal,
                ClockTime::elapsed(&x, &y) == 0
            );
            // Ordering agrees with the millisecond projection
            proptest::prop_assert_eq!(ClockTime::compare(&x, &y), a.cmp(&b));
        }
    }
}
