//! Specialized collection types
//!
//! Stable handles come from slot maps; recycled allocations come from
//! [`ObjectPool`]. Subsystems that tear down and rebuild structures every
//! frame return objects to a pool instead of dropping them, so the steady
//! state allocates nothing.

pub use slotmap::{DefaultKey, Key, SlotMap};

/// Trait for values that can be returned to an [`ObjectPool`]
///
/// `recycle` must clear the value to an empty state while preserving any
/// allocated capacity (call `Vec::clear`, not `Vec::new`).
pub trait Recycle: Default {
    /// Reset to an empty state, keeping allocations alive
    fn recycle(&mut self);
}

/// Bounded free-list of reusable objects
///
/// `acquire` hands out a recycled object when one is available and only
/// falls back to `T::default()` when the pool is dry. `release` recycles
/// the object back in; objects past the capacity limit are dropped.
#[derive(Debug)]
pub struct ObjectPool<T: Recycle> {
    free: Vec<T>,
    capacity: usize,
}

impl<T: Recycle> ObjectPool<T> {
    /// Create a pool that retains at most `capacity` free objects
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::new(),
            capacity,
        }
    }

    /// Take an object from the pool, or construct a fresh one
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_default()
    }

    /// Return an object to the pool
    ///
    /// The object is recycled immediately so pooled objects never hold
    /// stale references.
    pub fn release(&mut self, mut value: T) {
        if self.free.len() < self.capacity {
            value.recycle();
            self.free.push(value);
        }
    }

    /// Number of free objects currently pooled
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Scratch {
        data: Vec<u32>,
    }

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.data.clear();
        }
    }

    #[test]
    fn test_acquire_release_round_trip() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::new(4);
        let mut s = pool.acquire();
        s.data.extend_from_slice(&[1, 2, 3]);
        pool.release(s);
        assert_eq!(pool.free_count(), 1);

        // Recycled object comes back cleared but with capacity retained
        let s = pool.acquire();
        assert!(s.data.is_empty());
        assert!(s.data.capacity() >= 3);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_capacity_limit() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::new(2);
        for _ in 0..5 {
            pool.release(Scratch::default());
        }
        assert_eq!(pool.free_count(), 2);
    }
}
