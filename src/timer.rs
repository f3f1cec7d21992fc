//! Deadline timer on top of [`Clock`]
//!
//! A [`Deadline`] remembers when it was armed and for how long. Expiry is
//! derived from the current clock reading on every query and never stored.

use crate::clock::{Clock, ClockTime};

/// Relative deadline measured against a [`Clock`]
pub struct Deadline<'c> {
    clock: &'c Clock,
    start: ClockTime,
    interval: ClockTime,
}

impl<'c> Deadline<'c> {
    /// Zero-length deadline starting now
    pub fn new(clock: &'c Clock) -> Self {
        Self {
            clock,
            start: clock.snapshot(),
            interval: ClockTime::ZERO,
        }
    }

    /// Deadline expiring `ms` milliseconds from now
    pub fn after_millis(clock: &'c Clock, ms: u32) -> Self {
        let mut deadline = Self::new(clock);
        deadline.set_millis(ms);
        deadline
    }

    /// Drop the interval and rebase to now
    pub fn clear(&mut self) {
        self.interval = ClockTime::ZERO;
        self.reset();
    }

    /// Arm with a new interval starting now
    pub fn set(&mut self, interval: ClockTime) {
        self.interval = interval;
        self.reset();
    }

    /// Arm with an interval given in milliseconds
    pub fn set_millis(&mut self, ms: u32) {
        self.set(ClockTime::from_millis(ms as u64));
    }

    /// Restart the current interval from now
    pub fn reset(&mut self) {
        self.start = self.clock.snapshot();
    }

    /// Milliseconds left until expiry, negative once past it
    pub fn remaining(&self) -> i64 {
        let end = self.start.as_millis() + self.interval.as_millis();
        end as i64 - self.clock.snapshot().as_millis() as i64
    }

    /// True once [`remaining`](Self::remaining) drops below zero
    pub fn expired(&self) -> bool {
        self.remaining() < 0
    }

    /// Time the deadline was last rebased
    pub fn start(&self) -> ClockTime {
        self.start
    }

    /// Armed interval
    pub fn interval(&self) -> ClockTime {
        self.interval
    }
}
