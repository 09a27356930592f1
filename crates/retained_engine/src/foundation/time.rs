//! Frame timing and change timestamps
//!
//! The runtime stamps every change notification with a monotonically
//! increasing [`Timestamp`] and tracks the frame counter that drives
//! elapsed-frame wakeups. Timestamps order changes; they are not wall
//! clock times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonically increasing change-time value
///
/// Allocated by [`FrameClock::next_stamp`]. Two messages created by the
/// same clock are totally ordered by their stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

/// Shared clock owned by the runtime context
///
/// Thread-safe: mutation threads allocate stamps while workers read the
/// current reference time.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    stamp: AtomicU64,
    frame: AtomicU64,
}

impl FrameClock {
    /// Create a new clock starting at stamp zero, frame zero
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            stamp: AtomicU64::new(0),
            frame: AtomicU64::new(0),
        }
    }

    /// Allocate the next change timestamp
    pub fn next_stamp(&self) -> Timestamp {
        Timestamp(self.stamp.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// The most recently allocated timestamp
    ///
    /// Used as the reference time when draining message queues: everything
    /// known as of this stamp gets processed.
    pub fn current_stamp(&self) -> Timestamp {
        Timestamp(self.stamp.load(Ordering::Relaxed))
    }

    /// Advance the frame counter, returning the new frame number
    pub fn advance_frame(&self) -> u64 {
        self.frame.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current frame number
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    /// Wall-clock time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The instant the clock was created (base for timer deadlines)
    pub fn start_instant(&self) -> Instant {
        self.start
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamps_are_monotonic() {
        let clock = FrameClock::new();
        let a = clock.next_stamp();
        let b = clock.next_stamp();
        let c = clock.next_stamp();
        assert!(a < b && b < c);
        assert_eq!(clock.current_stamp(), c);
    }

    #[test]
    fn test_frame_counter() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.advance_frame(), 1);
        assert_eq!(clock.advance_frame(), 2);
        assert_eq!(clock.frame(), 2);
    }
}
