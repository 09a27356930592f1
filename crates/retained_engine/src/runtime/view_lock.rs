//! View-state lock
//!
//! Multiple-reader/single-writer lock guarding canvas/view derived-state
//! recomputation. Writers are prioritized over pending readers: once a
//! writer is waiting, new readers queue behind it, so renderer threads
//! never observe a half-updated transform for longer than one write.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

/// Writer-priority reader/writer signaling lock
///
/// Carries no data; the guarded state lives with its owners. RAII
/// guards release on drop.
#[derive(Debug, Default)]
pub struct ViewStateLock {
    state: Mutex<LockState>,
    readers_cv: Condvar,
    writers_cv: Condvar,
}

impl ViewStateLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire shared read access, yielding to waiting writers
    pub fn read(&self) -> ViewReadGuard<'_> {
        let mut state = self.state.lock().unwrap();
        while state.writer || state.waiting_writers > 0 {
            state = self.readers_cv.wait(state).unwrap();
        }
        state.readers += 1;
        ViewReadGuard { lock: self }
    }

    /// Acquire exclusive write access ahead of pending readers
    pub fn write(&self) -> ViewWriteGuard<'_> {
        let mut state = self.state.lock().unwrap();
        state.waiting_writers += 1;
        while state.writer || state.readers > 0 {
            state = self.writers_cv.wait(state).unwrap();
        }
        state.waiting_writers -= 1;
        state.writer = true;
        ViewWriteGuard { lock: self }
    }

    /// Try to acquire read access without blocking
    pub fn try_read(&self) -> Option<ViewReadGuard<'_>> {
        let mut state = self.state.lock().unwrap();
        if state.writer || state.waiting_writers > 0 {
            return None;
        }
        state.readers += 1;
        Some(ViewReadGuard { lock: self })
    }

    fn release_read(&self) {
        let mut state = self.state.lock().unwrap();
        state.readers -= 1;
        if state.readers == 0 {
            self.writers_cv.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock().unwrap();
        state.writer = false;
        if state.waiting_writers > 0 {
            self.writers_cv.notify_one();
        } else {
            self.readers_cv.notify_all();
        }
    }
}

/// Shared read access to view state
#[derive(Debug)]
pub struct ViewReadGuard<'a> {
    lock: &'a ViewStateLock,
}

impl Drop for ViewReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive write access to view state
#[derive(Debug)]
pub struct ViewWriteGuard<'a> {
    lock: &'a ViewStateLock,
}

impl Drop for ViewWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_concurrent_readers() {
        let lock = ViewStateLock::new();
        let a = lock.read();
        let b = lock.read();
        drop(a);
        drop(b);
        let _w = lock.write();
    }

    #[test]
    fn test_waiting_writer_blocks_new_readers() {
        let lock = Arc::new(ViewStateLock::new());
        let reader = lock.read();

        let writer = {
            let lock = Arc::clone(&lock);
            std::thread::spawn(move || {
                let _w = lock.write();
            })
        };
        // Let the writer start waiting.
        std::thread::sleep(Duration::from_millis(30));
        assert!(lock.try_read().is_none());

        drop(reader);
        writer.join().unwrap();
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn test_writes_are_exclusive() {
        let lock = Arc::new(ViewStateLock::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let _w = lock.write();
                    let seen = counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(counter.load(Ordering::SeqCst), seen + 1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 400);
    }
}
