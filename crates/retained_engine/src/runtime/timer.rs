//! Wakeup deadline timer
//!
//! A min-heap of deadlines shared between the behavior structure (which
//! registers elapsed-time wakeups) and the timer thread (which sleeps
//! until the heap minimum or an explicit add-notify, then delivers the
//! due entries).

use crate::structures::targets::NnuId;
use crossbeam::channel::Sender;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

/// One scheduled wakeup deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEntry {
    /// When the wakeup is due
    pub deadline: Instant,
    /// Behavior owning the elapsed-time criterion
    pub behavior: NnuId,
    /// Registration serial, mapping back to the criterion
    pub serial: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.serial.cmp(&other.serial))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct TimerState {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    shutdown: bool,
}

/// Shared deadline heap with add-notify signaling
#[derive(Debug, Default)]
pub struct TimerQueue {
    state: Mutex<TimerState>,
    notify: Condvar,
}

impl TimerQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a deadline; wakes the timer thread if it shortens the wait
    pub fn add(&self, entry: TimerEntry) {
        let mut state = self.state.lock().unwrap();
        state.heap.push(Reverse(entry));
        self.notify.notify_one();
    }

    /// Drop every deadline registered by a behavior
    ///
    /// Safe to call for a behavior with nothing scheduled; deregistration
    /// mid-flight is a no-op for entries already delivered.
    pub fn remove_behavior(&self, behavior: NnuId) {
        let mut state = self.state.lock().unwrap();
        let kept: BinaryHeap<Reverse<TimerEntry>> = state
            .heap
            .drain()
            .filter(|Reverse(e)| e.behavior != behavior)
            .collect();
        state.heap = kept;
    }

    /// Number of scheduled deadlines
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().heap.len()
    }

    /// Whether no deadlines are scheduled
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().heap.is_empty()
    }

    /// Pop every entry due at or before `now` without blocking
    pub fn drain_due(&self, now: Instant) -> Vec<TimerEntry> {
        let mut state = self.state.lock().unwrap();
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = state.heap.peek() {
            if entry.deadline > now {
                break;
            }
            if let Some(Reverse(e)) = state.heap.pop() {
                due.push(e);
            }
        }
        due
    }

    /// Block until at least one entry is due or shutdown is requested
    ///
    /// Waits on the heap-min deadline, re-checking after every add-notify.
    /// Returns `None` on shutdown.
    pub fn wait_due(&self) -> Option<Vec<TimerEntry>> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return None;
            }
            let now = Instant::now();
            match state.heap.peek() {
                None => {
                    state = self.notify.wait(state).unwrap();
                }
                Some(Reverse(next)) if next.deadline > now => {
                    let timeout = next.deadline - now;
                    let (next_state, _) = self.notify.wait_timeout(state, timeout).unwrap();
                    state = next_state;
                }
                Some(_) => {
                    let mut due = Vec::new();
                    while let Some(Reverse(entry)) = state.heap.peek() {
                        if entry.deadline > now {
                            break;
                        }
                        if let Some(Reverse(e)) = state.heap.pop() {
                            due.push(e);
                        }
                    }
                    return Some(due);
                }
            }
        }
    }

    /// Request shutdown, waking any blocked waiter
    pub fn shutdown(&self) {
        self.state.lock().unwrap().shutdown = true;
        self.notify.notify_all();
    }
}

/// Dedicated thread delivering due deadlines to a channel
pub struct TimerThread {
    queue: Arc<TimerQueue>,
    handle: Option<JoinHandle<()>>,
}

impl TimerThread {
    /// Spawn the timer thread delivering due entries on `sink`
    pub fn spawn(queue: Arc<TimerQueue>, sink: Sender<TimerEntry>) -> std::io::Result<Self> {
        let worker_queue = Arc::clone(&queue);
        let handle = std::thread::Builder::new()
            .name("timer".to_string())
            .spawn(move || {
                log::debug!("timer thread started");
                while let Some(due) = worker_queue.wait_due() {
                    for entry in due {
                        if sink.send(entry).is_err() {
                            log::debug!("timer sink closed, stopping");
                            worker_queue.shutdown();
                            break;
                        }
                    }
                }
                log::debug!("timer thread stopped");
            })?;
        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// The shared deadline queue
    pub fn queue(&self) -> &Arc<TimerQueue> {
        &self.queue
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.queue.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
