//! Structure trait and update workers
//!
//! A structure is a per-category message-processing subsystem. Each one
//! is driven by a dedicated worker thread that blocks until the master
//! control thread signals new work; the worker's whole job per signal is
//! one `process_messages` call. All category-specific logic lives in the
//! structure, never in the thread.

use crate::foundation::time::Timestamp;
use crate::structures::message::{ChangeMessage, MessagePool, ThreadKinds};
use crate::structures::queue::MessageQueue;
use crossbeam::channel::{unbounded, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Per-category message-processing subsystem
pub trait Structure: Send + 'static {
    /// The single category bit this structure serves
    fn kind(&self) -> ThreadKinds;

    /// Apply a drained batch of messages
    ///
    /// Messages arrive in queue order; the batch is everything known as
    /// of `reference_time`. Consumption runs to completion before the
    /// next batch is requested — there is no partial-batch rollback.
    fn process_messages(&mut self, messages: &[Arc<ChangeMessage>], reference_time: Timestamp);
}

/// Signal delivered to a structure worker
#[derive(Debug, Clone, Copy)]
pub enum WorkerSignal {
    /// Drain and process messages up to the given reference time
    Work(Timestamp),
    /// Exit the worker loop
    Shutdown,
}

/// Dedicated worker thread bound to exactly one structure
pub struct StructureUpdateWorker {
    kind: ThreadKinds,
    queue: Arc<Mutex<MessageQueue>>,
    sender: Sender<WorkerSignal>,
    handle: Option<JoinHandle<()>>,
}

impl StructureUpdateWorker {
    /// Spawn a worker owning `structure`
    ///
    /// The worker blocks on its signal channel; on `Work(t)` it drains
    /// the queue prefix up to `t`, hands the batch to the structure, and
    /// releases each message's consumption reference. On shutdown it
    /// clears any still-queued messages so the pool does not leak.
    pub fn spawn(
        mut structure: Box<dyn Structure>,
        pool: Arc<MessagePool>,
    ) -> std::io::Result<Self> {
        let kind = structure.kind();
        let queue = Arc::new(Mutex::new(MessageQueue::new()));
        let worker_queue = Arc::clone(&queue);
        let (sender, receiver) = unbounded::<WorkerSignal>();

        let handle = std::thread::Builder::new()
            .name(format!("structure-{kind:?}"))
            .spawn(move || {
                log::debug!("structure worker {kind:?} started");
                loop {
                    match receiver.recv() {
                        Ok(WorkerSignal::Work(reference_time)) => {
                            let batch = worker_queue.lock().unwrap().get_messages(reference_time);
                            if !batch.is_empty() {
                                structure.process_messages(&batch, reference_time);
                                for message in &batch {
                                    pool.dec_ref(message);
                                }
                            }
                        }
                        Ok(WorkerSignal::Shutdown) | Err(_) => break,
                    }
                }
                worker_queue.lock().unwrap().clear_messages(&pool);
                log::debug!("structure worker {kind:?} stopped");
            })?;

        Ok(Self {
            kind,
            queue,
            sender,
            handle: Some(handle),
        })
    }

    /// The category bit this worker serves
    pub fn kind(&self) -> ThreadKinds {
        self.kind
    }

    /// The worker's inbound queue (shared with the master for routing)
    pub fn queue(&self) -> &Arc<Mutex<MessageQueue>> {
        &self.queue
    }

    /// Signal the worker to process messages up to `reference_time`
    pub fn signal_work(&self, reference_time: Timestamp) {
        if self.sender.send(WorkerSignal::Work(reference_time)).is_err() {
            log::error!("structure worker {:?} is gone; signal dropped", self.kind);
        }
    }

    /// Stop the worker and join its thread
    pub fn shutdown(mut self) {
        let _ = self.sender.send(WorkerSignal::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("structure worker {:?} panicked", self.kind);
            }
        }
    }
}

impl Drop for StructureUpdateWorker {
    fn drop(&mut self) {
        // Dropping the sender ends the worker loop; join if still running.
        let _ = self.sender.send(WorkerSignal::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::message::MessageKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStructure {
        seen: Arc<AtomicUsize>,
    }

    impl Structure for CountingStructure {
        fn kind(&self) -> ThreadKinds {
            ThreadKinds::TRANSFORM
        }

        fn process_messages(&mut self, messages: &[Arc<ChangeMessage>], _: Timestamp) {
            self.seen.fetch_add(messages.len(), Ordering::SeqCst);
        }
    }

    #[test]
    fn test_worker_processes_signaled_batches() {
        let pool = Arc::new(MessagePool::new(8));
        let seen = Arc::new(AtomicUsize::new(0));
        let worker = StructureUpdateWorker::spawn(
            Box::new(CountingStructure { seen: seen.clone() }),
            Arc::clone(&pool),
        )
        .unwrap();

        for stamp in 1..=3 {
            let msg = pool.acquire(
                MessageKind::TransformChanged,
                Timestamp(stamp),
                ThreadKinds::TRANSFORM,
                Vec::new(),
            );
            worker.queue().lock().unwrap().add_message(msg);
        }

        worker.signal_work(Timestamp(2));
        worker.signal_work(Timestamp(3));
        worker.shutdown();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        // All consumption references were released back to the pool.
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn test_shutdown_clears_unprocessed_messages() {
        let pool = Arc::new(MessagePool::new(8));
        let seen = Arc::new(AtomicUsize::new(0));
        let worker = StructureUpdateWorker::spawn(
            Box::new(CountingStructure { seen: seen.clone() }),
            Arc::clone(&pool),
        )
        .unwrap();

        let msg = pool.acquire(
            MessageKind::TransformChanged,
            Timestamp(10),
            ThreadKinds::TRANSFORM,
            Vec::new(),
        );
        worker.queue().lock().unwrap().add_message(msg);
        worker.shutdown();

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(pool.free_count(), 1);
    }
}
