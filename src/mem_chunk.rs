//! Resumable cursor over a byte region
//!
//! A [`MemChunk`] pairs a borrowed region with a `progress` offset. Chunked
//! UART transfers advance `progress` byte by byte and stop on backpressure,
//! so calling them again with the same chunk resumes exactly where the
//! previous call left off.

/// `{base, length, progress}` view; never owns the underlying memory
#[derive(Debug)]
pub struct MemChunk<B> {
    base: B,
    progress: usize,
}

impl<B: AsRef<[u8]>> MemChunk<B> {
    /// Cursor at the start of `base`
    #[inline]
    pub fn new(base: B) -> Self {
        Self { base, progress: 0 }
    }

    /// Cursor resuming at `progress`, clamped to the region length
    #[inline]
    pub fn with_progress(base: B, progress: usize) -> Self {
        let progress = progress.min(base.as_ref().len());
        Self { base, progress }
    }

    /// Region length
    #[inline]
    pub fn len(&self) -> usize {
        self.base.as_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes already transferred
    #[inline]
    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Bytes still to transfer
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len() - self.progress
    }

    /// True once `progress == length`
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.progress == self.len()
    }

    /// Byte at the cursor
    #[inline]
    pub fn current(&self) -> Option<u8> {
        self.base.as_ref().get(self.progress).copied()
    }

    /// Move the cursor one byte forward
    #[inline]
    pub fn advance(&mut self) {
        if self.progress < self.len() {
            self.progress += 1;
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> MemChunk<B> {
    /// Store `byte` at the cursor and advance; false when already complete
    #[inline]
    pub fn fill(&mut self, byte: u8) -> bool {
        match self.base.as_mut().get_mut(self.progress) {
            Some(slot) => {
                *slot = byte;
                self.progress += 1;
                true
            }
            None => false,
        }
    }

    /// Sub-cursor of `size` bytes starting at the current progress
    ///
    /// Returns `None` when fewer than `size` bytes remain.
    pub fn slice_from_progress(&mut self, size: usize) -> Option<MemChunk<&mut [u8]>> {
        let start = self.progress;
        let end = start.checked_add(size)?;
        let region = self.base.as_mut().get_mut(start..end)?;
        Some(MemChunk::new(region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_exceeds_length() {
        let data = [1u8, 2, 3];
        let mut chunk = MemChunk::new(&data[..]);

        assert_eq!(chunk.current(), Some(1));
        for _ in 0..10 {
            chunk.advance();
        }
        assert_eq!(chunk.progress(), 3);
        assert!(chunk.is_complete());
        assert_eq!(chunk.current(), None);
        assert_eq!(chunk.remaining(), 0);
    }

    #[test]
    fn test_fill_writes_in_place() {
        let mut buf = [0u8; 2];
        let mut chunk = MemChunk::new(&mut buf[..]);

        assert!(chunk.fill(0xAA));
        assert!(chunk.fill(0xBB));
        assert!(!chunk.fill(0xCC));
        assert_eq!(chunk.remaining(), 0);
        assert_eq!(buf, [0xAA, 0xBB]);
    }

    #[test]
    fn test_with_progress_clamps() {
        let data = [0u8; 4];
        let chunk = MemChunk::with_progress(&data[..], 9);
        assert_eq!(chunk.progress(), 4);

        let chunk = MemChunk::with_progress(&data[..], 1);
        assert_eq!(chunk.remaining(), 3);
    }

    #[test]
    fn test_slice_from_progress() {
        let mut buf = [0u8; 6];
        let mut chunk = MemChunk::new(&mut buf[..]);
        chunk.fill(1);
        chunk.fill(2);

        assert!(chunk.slice_from_progress(5).is_none());

        let mut slice = chunk.slice_from_progress(4).unwrap();
        assert_eq!(slice.len(), 4);
        assert_eq!(slice.progress(), 0);
        slice.fill(9);

        assert_eq!(buf, [1, 2, 9, 0, 0, 0]);
    }
}
