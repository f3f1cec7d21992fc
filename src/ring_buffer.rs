//! Fixed-capacity byte FIFO shared between interrupt and foreground code
//!
//! Every operation runs inside a critical section, so the opposing context
//! never sees the count and indices out of step with each other.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

/// Interrupt-safe byte queue with capacity `N`
pub struct RingBuffer<const N: usize> {
    inner: Mutex<RefCell<Deque<u8, N>>>,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Enqueue one byte; returns the byte back when the buffer is full
    #[inline]
    pub fn put(&self, byte: u8) -> Result<(), u8> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).push_back(byte))
    }

    /// Enqueue two bytes atomically, or neither
    pub fn put_pair(&self, first: u8, second: u8) -> Result<(), (u8, u8)> {
        critical_section::with(|cs| {
            let mut fifo = self.inner.borrow_ref_mut(cs);
            if N - fifo.len() < 2 {
                return Err((first, second));
            }
            // Room for both was checked above
            let _ = fifo.push_back(first);
            let _ = fifo.push_back(second);
            Ok(())
        })
    }

    /// Dequeue the oldest byte
    #[inline]
    pub fn get(&self) -> Option<u8> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).pop_front())
    }

    /// Number of queued bytes
    #[inline]
    pub fn size(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).len())
    }

    /// Fixed capacity
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Free slots left
    #[inline]
    pub fn unused_size(&self) -> usize {
        N - self.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == N
    }

    /// Drop all queued bytes
    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).clear());
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    #[test]
    fn test_empty_and_full_edges() {
        let fifo: RingBuffer<4> = RingBuffer::new();
        assert!(fifo.is_empty());
        assert_eq!(fifo.get(), None);
        assert_eq!(fifo.unused_size(), 4);

        for b in 1..=4 {
            assert_eq!(fifo.put(b), Ok(()));
        }
        assert!(fifo.is_full());
        assert_eq!(fifo.put(5), Err(5));
        assert_eq!(fifo.size(), 4);
        assert_eq!(fifo.unused_size(), 0);
    }

    #[test]
    fn test_wraps_around_storage() {
        let fifo: RingBuffer<3> = RingBuffer::new();
        for round in 0u8..10 {
            fifo.put(round).unwrap();
            fifo.put(round.wrapping_add(100)).unwrap();
            assert_eq!(fifo.get(), Some(round));
            assert_eq!(fifo.get(), Some(round.wrapping_add(100)));
        }
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_put_pair_is_all_or_nothing() {
        let fifo: RingBuffer<3> = RingBuffer::new();
        fifo.put(b'a').unwrap();
        fifo.put(b'b').unwrap();

        assert_eq!(fifo.put_pair(b'\r', b'\n'), Err((b'\r', b'\n')));
        assert_eq!(fifo.size(), 2);

        assert_eq!(fifo.get(), Some(b'a'));
        assert_eq!(fifo.put_pair(b'\r', b'\n'), Ok(()));
        assert_eq!(fifo.get(), Some(b'b'));
        assert_eq!(fifo.get(), Some(b'\r'));
        assert_eq!(fifo.get(), Some(b'\n'));
    }

    #[test]
    fn test_clear() {
        let fifo: RingBuffer<8> = RingBuffer::new();
        fifo.put(1).unwrap();
        fifo.put(2).unwrap();
        fifo.clear();
        assert!(fifo.is_empty());
        assert_eq!(fifo.get(), None);
    }

    proptest! {
        // `Some(b)` is a put, `None` a get; checked against a model queue
        #[test]
        fn prop_fifo_matches_model(
            ops in proptest::collection::vec(proptest::option::of(any::<u8>()), 0..200),
        ) {
            let fifo: RingBuffer<8> = RingBuffer::new();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Some(byte) => {
                        let was_full = fifo.size() == fifo.capacity();
                        let res = fifo.put(byte);
                        prop_assert_eq!(res.is_err(), was_full);
                        if res.is_ok() {
                            model.push_back(byte);
                        }
                    }
                    None => {
                        let was_empty = fifo.size() == 0;
                        let got = fifo.get();
                        prop_assert_eq!(got.is_none(), was_empty);
                        prop_assert_eq!(got, model.pop_front());
                    }
                }
                prop_assert!(fifo.size() <= fifo.capacity());
                prop_assert_eq!(fifo.size(), model.len());
            }
        }
    }
}
