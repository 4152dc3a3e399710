//! Ring Buffer with Look-Back Access
//!
//! Fixed-capacity circular byte store. Once full, every push overwrites
//! the oldest byte. Positions are addressed by look-back offset:
//! - offset 0: the most recently pushed byte
//! - offset k: the byte pushed k steps earlier
//! - any offset (negative or past capacity) wraps modulo capacity
//!
//! All state sits behind a per-instance mutex. Every public operation holds
//! the lock for its whole duration, so callers sharing a buffer through `Arc`
//! observe a total order of operations on that instance.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use thiserror::Error;

/// Ring buffer misuse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// `pop()` with no valid bytes left
    #[error("pop from empty ring buffer")]
    EmptyBuffer,
    /// `set_valid_count()` tried to grow the valid region
    #[error("cannot raise valid count to {requested}: only {current} bytes are valid")]
    InvalidShrink { requested: usize, current: usize },
    /// Capacity of zero requested at construction or resize
    #[error("ring buffer capacity must be at least 1, got {requested}")]
    CapacityPrecondition { requested: usize },
    /// `range()` called with `high < low`
    #[error("invalid range: high offset {high} is below low offset {low}")]
    InvalidRange { high: isize, low: isize },
}

/// Lock-protected state. Only ever touched through a held guard.
#[derive(Clone)]
struct RingState {
    storage: Vec<u8>,
    /// Next slot to be overwritten
    write_index: usize,
    valid_count: usize,
}

impl RingState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity],
            write_index: 0,
            valid_count: 0,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Physical slot for a look-back offset.
    #[inline]
    fn slot(&self, offset: isize) -> usize {
        let capacity = self.capacity();
        // rem_euclid keeps this in [0, capacity) for any offset sign.
        let back = offset.rem_euclid(capacity as isize) as usize;
        (self.write_index + capacity - 1 - back) % capacity
    }

    fn push(&mut self, value: u8) -> u8 {
        let evicted = std::mem::replace(&mut self.storage[self.write_index], value);
        self.write_index = (self.write_index + 1) % self.capacity();
        if self.valid_count < self.capacity() {
            self.valid_count += 1;
        }
        evicted
    }

    fn range(&self, high: isize, low: isize) -> Result<Vec<u8>, RingError> {
        if high < low {
            return Err(RingError::InvalidRange { high, low });
        }
        Ok((low..=high)
            .rev()
            .map(|offset| self.storage[self.slot(offset)])
            .collect())
    }
}

/// Thread-safe fixed-capacity byte ring with look-back indexing
pub struct RingBuffer {
    state: Mutex<RingState>,
}

impl RingBuffer {
    /// Create with fixed capacity. Unused slots start out as zero bytes.
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::CapacityPrecondition { requested: 0 });
        }
        Ok(Self {
            state: Mutex::new(RingState::with_capacity(capacity)),
        })
    }

    /// Every operation leaves the state consistent before it can panic,
    /// so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `value` at the write position and return the byte it replaced.
    ///
    /// The returned byte is only a real eviction once the buffer has filled;
    /// before that it is whatever the unused slot held.
    pub fn push(&self, value: u8) -> u8 {
        self.lock().push(value)
    }

    /// Push every byte of `bytes` under a single lock acquisition.
    pub fn extend_from_slice(&self, bytes: &[u8]) {
        let mut state = self.lock();
        for &byte in bytes {
            state.push(byte);
        }
    }

    /// Remove and return the oldest valid byte.
    pub fn pop(&self) -> Result<u8, RingError> {
        let mut state = self.lock();
        if state.valid_count == 0 {
            return Err(RingError::EmptyBuffer);
        }
        state.valid_count -= 1;
        let offset = state.valid_count as isize;
        Ok(state.storage[state.slot(offset)])
    }

    /// The byte the next `push` will evict. Does not mutate.
    pub fn peek(&self) -> u8 {
        let state = self.lock();
        state.storage[state.write_index]
    }

    /// Read the byte `offset` steps back from the newest one.
    pub fn at(&self, offset: isize) -> u8 {
        let state = self.lock();
        state.storage[state.slot(offset)]
    }

    /// Overwrite the byte `offset` steps back from the newest one.
    pub fn set(&self, offset: isize, value: u8) {
        let mut state = self.lock();
        let slot = state.slot(offset);
        state.storage[slot] = value;
    }

    /// Forget valid bytes. The count can only go down.
    pub fn set_valid_count(&self, count: usize) -> Result<(), RingError> {
        let mut state = self.lock();
        if count > state.valid_count {
            return Err(RingError::InvalidShrink {
                requested: count,
                current: state.valid_count,
            });
        }
        state.valid_count = count;
        Ok(())
    }

    /// Reallocate to `new_capacity`, keeping the newest
    /// `min(capacity, new_capacity)` bytes in chronological order.
    ///
    /// The preserved bytes land at the start of the new storage, oldest
    /// first, and the write position follows right after them.
    pub fn resize(&self, new_capacity: usize) -> Result<(), RingError> {
        if new_capacity == 0 {
            return Err(RingError::CapacityPrecondition { requested: 0 });
        }

        let mut state = self.lock();
        let old_capacity = state.capacity();
        let kept = old_capacity.min(new_capacity);

        let mut storage = vec![0u8; new_capacity];
        for (slot, offset) in storage[..kept].iter_mut().zip((0..kept).rev()) {
            *slot = state.storage[state.slot(offset as isize)];
        }

        state.storage = storage;
        state.write_index = kept % new_capacity;
        state.valid_count = state.valid_count.min(new_capacity);

        debug!(
            "ring buffer resized: {} -> {} bytes, {} preserved",
            old_capacity, new_capacity, kept
        );
        Ok(())
    }

    /// Reset positions. Storage bytes are left in place.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.write_index = 0;
        state.valid_count = 0;
    }

    /// Bytes at offsets `high` down to `low` (inclusive), oldest first.
    pub fn range(&self, high: isize, low: isize) -> Result<Vec<u8>, RingError> {
        self.lock().range(high, low)
    }

    /// All valid bytes, oldest first
    pub fn to_vec(&self) -> Vec<u8> {
        let state = self.lock();
        match state.valid_count {
            0 => Vec::new(),
            n => state.range(n as isize - 1, 0).unwrap_or_default(),
        }
    }

    /// Independent copy of the full state, taken under this buffer's lock.
    pub fn snapshot(&self) -> Self {
        let state = self.lock().clone();
        Self {
            state: Mutex::new(state),
        }
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Number of valid bytes
    pub fn valid_count(&self) -> usize {
        self.lock().valid_count
    }

    /// Whether no bytes are valid
    pub fn is_empty(&self) -> bool {
        self.lock().valid_count == 0
    }

    /// Whether every slot holds a valid byte
    pub fn is_full(&self) -> bool {
        let state = self.lock();
        state.valid_count == state.capacity()
    }
}

impl Clone for RingBuffer {
    fn clone(&self) -> Self {
        self.snapshot()
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &state.capacity())
            .field("write_index", &state.write_index)
            .field("valid_count", &state.valid_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::QuickCheck;
    use std::sync::Arc;

    fn filled(capacity: usize, values: impl IntoIterator<Item = u8>) -> RingBuffer {
        let ring = RingBuffer::new(capacity).unwrap();
        for v in values {
            ring.push(v);
        }
        ring
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            RingBuffer::new(0).unwrap_err(),
            RingError::CapacityPrecondition { requested: 0 }
        );
    }

    #[test]
    fn test_push_then_at_zero() {
        let ring = RingBuffer::new(3).unwrap();
        for v in 1..=10u8 {
            ring.push(v);
            assert_eq!(ring.at(0), v);
            assert!(ring.valid_count() <= 3);
        }
        assert!(ring.is_full());
    }

    #[test]
    fn test_push_returns_evicted_after_fill() {
        let ring = filled(4, [1, 2, 3, 4]);
        assert_eq!(ring.valid_count(), 4);
        assert_eq!(ring.push(5), 1);
        assert_eq!(ring.push(6), 2);
    }

    #[test]
    fn test_push_before_fill_returns_default() {
        let ring = RingBuffer::new(4).unwrap();
        assert_eq!(ring.push(9), 0);
    }

    #[test]
    fn test_look_back_and_wraparound() {
        let ring = filled(4, [10, 20, 30, 40, 50]);
        assert_eq!(ring.at(0), 50);
        assert_eq!(ring.at(1), 40);
        assert_eq!(ring.at(3), 20);
        // Wraps modulo capacity in both directions
        assert_eq!(ring.at(4), 50);
        assert_eq!(ring.at(-1), 20);
        assert_eq!(ring.at(isize::MIN), ring.at(isize::MIN.rem_euclid(4)));
    }

    #[test]
    fn test_set() {
        let ring = filled(4, [1, 2, 3]);
        ring.set(1, 99);
        assert_eq!(ring.at(1), 99);
        assert_eq!(ring.at(0), 3);
    }

    #[test]
    fn test_peek_is_next_eviction() {
        let ring = filled(3, [7, 8, 9]);
        assert_eq!(ring.peek(), 7);
        assert_eq!(ring.peek(), ring.at(2));
        assert_eq!(ring.push(10), 7);
        assert_eq!(ring.peek(), 8);
    }

    #[test]
    fn test_pop_oldest_first() {
        let ring = filled(4, [1, 2, 3]);
        assert_eq!(ring.pop(), Ok(1));
        assert_eq!(ring.pop(), Ok(2));
        assert_eq!(ring.pop(), Ok(3));
        assert_eq!(ring.pop(), Err(RingError::EmptyBuffer));
    }

    #[test]
    fn test_pop_empty_leaves_state() {
        let ring = RingBuffer::new(2).unwrap();
        assert_eq!(ring.pop(), Err(RingError::EmptyBuffer));
        assert_eq!(ring.valid_count(), 0);
        assert_eq!(ring.push(5), 0);
        assert_eq!(ring.at(0), 5);
    }

    #[test]
    fn test_set_valid_count_only_shrinks() {
        let ring = filled(4, [1, 2, 3]);
        assert_eq!(
            ring.set_valid_count(4),
            Err(RingError::InvalidShrink {
                requested: 4,
                current: 3
            })
        );
        assert_eq!(ring.valid_count(), 3);

        ring.set_valid_count(1).unwrap();
        assert_eq!(ring.valid_count(), 1);
        assert_eq!(ring.pop(), Ok(3));
    }

    #[test]
    fn test_resize_shrink_keeps_newest() {
        let ring = filled(8, 1..=10);
        ring.resize(3).unwrap();
        assert_eq!(ring.capacity(), 3);
        assert_eq!(ring.at(0), 10);
        assert_eq!(ring.at(1), 9);
        assert_eq!(ring.at(2), 8);
        assert_eq!(ring.valid_count(), 3);
        // Next push evicts the oldest preserved byte
        assert_eq!(ring.push(11), 8);
    }

    #[test]
    fn test_resize_grow_keeps_order() {
        let ring = filled(3, [1, 2, 3, 4]);
        ring.resize(5).unwrap();
        assert_eq!(ring.range(2, 0).unwrap(), vec![2, 3, 4]);
        assert_eq!(ring.valid_count(), 3);
        ring.push(5);
        assert_eq!(ring.to_vec(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_resize_zero_rejected() {
        let ring = filled(3, [1, 2, 3]);
        assert_eq!(
            ring.resize(0),
            Err(RingError::CapacityPrecondition { requested: 0 })
        );
        assert_eq!(ring.capacity(), 3);
        assert_eq!(ring.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_reset() {
        let ring = filled(3, [1, 2]);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.push(7), 1);
    }

    #[test]
    fn test_range_order() {
        let ring = filled(5, [1, 2, 3, 4, 5]);
        assert_eq!(ring.range(3, 1).unwrap(), vec![2, 3, 4]);
        assert_eq!(ring.range(0, 0).unwrap(), vec![5]);
        assert_eq!(
            ring.range(0, 1),
            Err(RingError::InvalidRange { high: 0, low: 1 })
        );
    }

    #[test]
    fn test_snapshot_is_independent() {
        let ring = filled(3, [1, 2, 3]);
        let copy = ring.snapshot();
        ring.push(4);
        assert_eq!(copy.to_vec(), vec![1, 2, 3]);
        assert_eq!(ring.to_vec(), vec![2, 3, 4]);

        let cloned = ring.clone();
        assert_eq!(cloned.at(0), 4);
    }

    #[test]
    fn test_range_matches_at_quickcheck() {
        fn prop(values: Vec<u8>, capacity: u8, high: u8, span: u8) -> bool {
            let capacity = usize::from(capacity % 16) + 1;
            let ring = filled(capacity, values);
            let high = isize::from(high % 32);
            let low = high - isize::from(span % 8).min(high);
            let expected: Vec<u8> = (low..=high).rev().map(|o| ring.at(o)).collect();
            let got = ring.range(high, low).unwrap();
            got.len() as isize == high - low + 1 && got == expected
        }

        QuickCheck::new()
            .tests(1_000)
            .quickcheck(prop as fn(Vec<u8>, u8, u8, u8) -> bool);
    }

    #[test]
    fn test_resize_preserves_newest_quickcheck() {
        fn prop(values: Vec<u8>, old: u8, new: u8) -> bool {
            let old = usize::from(old % 16) + 1;
            let new = usize::from(new % 16) + 1;
            let ring = filled(old, values.iter().copied());
            let before: Vec<u8> = (0..old.min(new)).map(|o| ring.at(o as isize)).collect();
            ring.resize(new).unwrap();
            let after: Vec<u8> = (0..old.min(new)).map(|o| ring.at(o as isize)).collect();
            before == after && ring.valid_count() <= new
        }

        QuickCheck::new()
            .tests(1_000)
            .quickcheck(prop as fn(Vec<u8>, u8, u8) -> bool);
    }

    #[tokio::test]
    async fn test_concurrent_pushes_keep_invariants() {
        let ring = Arc::new(RingBuffer::new(64).unwrap());

        let mut handles = Vec::new();
        for worker in 0..4u8 {
            let ring = Arc::clone(&ring);
            handles.push(tokio::task::spawn_blocking(move || {
                for _ in 0..1_000 {
                    ring.push(worker);
                    let _ = ring.at(0);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ring.valid_count(), 64);
        assert!(ring.to_vec().iter().all(|&b| b < 4));
    }
}
