//! Master control
//!
//! The top-level driver: routes change messages to the structure workers
//! addressed by their recipient bitmask, converts due timer deadlines
//! into elapsed-time messages, and pumps one frame at a time by
//! signaling every worker with the current reference stamp.

use crate::foundation::time::{FrameClock, Timestamp};
use crate::runtime::context::RuntimeContext;
use crate::runtime::notify::NotificationThread;
use crate::runtime::timer::{TimerEntry, TimerThread};
use crate::structures::message::{MessageArg, MessageKind, MessagePool, ThreadKinds};
use crate::structures::structure::{Structure, StructureUpdateWorker};
use crossbeam::channel::{unbounded, Receiver};
use std::sync::Arc;

/// Top-level frame driver and message router
pub struct MasterControl {
    pool: Arc<MessagePool>,
    clock: Arc<FrameClock>,
    workers: Vec<StructureUpdateWorker>,
    timer_thread: Option<TimerThread>,
    timer_events: Receiver<TimerEntry>,
    notifications: NotificationThread,
}

impl MasterControl {
    /// Start the master over a context's shared services
    ///
    /// Spawns the timer and notification threads; structure workers are
    /// added with [`Self::register_structure`].
    pub fn new(context: &RuntimeContext) -> std::io::Result<Self> {
        let (timer_tx, timer_events) = unbounded();
        let timer_thread = TimerThread::spawn(Arc::clone(context.timer_queue()), timer_tx)?;
        let notifications = NotificationThread::spawn()?;
        log::info!("master control started");
        Ok(Self {
            pool: Arc::clone(context.message_pool()),
            clock: Arc::clone(context.clock()),
            workers: Vec::new(),
            timer_thread: Some(timer_thread),
            timer_events,
            notifications,
        })
    }

    /// Spawn a worker thread for a structure
    pub fn register_structure(&mut self, structure: Box<dyn Structure>) -> std::io::Result<()> {
        let worker = StructureUpdateWorker::spawn(structure, Arc::clone(&self.pool))?;
        log::info!("registered structure worker {:?}", worker.kind());
        self.workers.push(worker);
        Ok(())
    }

    /// Create and route a change message
    ///
    /// The message gets the next change stamp and one consumption
    /// reference per addressed worker. Returns the stamp.
    pub fn send_message(
        &self,
        kind: MessageKind,
        recipients: ThreadKinds,
        args: Vec<MessageArg>,
    ) -> Timestamp {
        let stamp = self.clock.next_stamp();
        let message = self.pool.acquire(kind, stamp, recipients, args);
        let mut delivered = false;
        for worker in &self.workers {
            if recipients.intersects(worker.kind()) {
                worker
                    .queue()
                    .lock()
                    .unwrap()
                    .add_message(Arc::clone(&message));
                delivered = true;
            }
        }
        if !delivered {
            log::debug!("message {kind:?} had no registered recipients");
        }
        stamp
    }

    /// Pump one frame
    ///
    /// Due timer deadlines become elapsed-time messages, the frame tick
    /// goes out, and every worker is signaled with the reference stamp
    /// covering everything queued so far.
    pub fn pump_frame(&mut self) {
        while let Ok(entry) = self.timer_events.try_recv() {
            self.send_message(
                MessageKind::TimeElapsed,
                ThreadKinds::BEHAVIOR,
                vec![
                    MessageArg::Id(entry.behavior),
                    MessageArg::Count(entry.serial),
                ],
            );
        }
        self.send_message(MessageKind::FrameTick, ThreadKinds::BEHAVIOR, Vec::new());

        let reference = self.clock.current_stamp();
        for worker in &self.workers {
            worker.signal_work(reference);
        }
        let frame = self.clock.advance_frame();
        log::debug!("frame {frame} pumped at stamp {}", reference.0);
    }

    /// The async render-error dispatch thread
    pub fn notifications(&self) -> &NotificationThread {
        &self.notifications
    }

    /// Registered worker count
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop every worker and the timer thread, joining them all
    pub fn shutdown(mut self) {
        for worker in self.workers.drain(..) {
            worker.shutdown();
        }
        self.timer_thread.take();
        log::info!("master control stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::structures::message::ChangeMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingStructure {
        kind: ThreadKinds,
        seen: Arc<AtomicUsize>,
    }

    impl Structure for CountingStructure {
        fn kind(&self) -> ThreadKinds {
            self.kind
        }

        fn process_messages(&mut self, messages: &[Arc<ChangeMessage>], _: Timestamp) {
            self.seen.fetch_add(messages.len(), Ordering::SeqCst);
        }
    }

    fn wait_for(seen: &Arc<AtomicUsize>, expected: usize) {
        for _ in 0..200 {
            if seen.load(Ordering::SeqCst) >= expected {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_routing_follows_recipient_bitmask() {
        let context = RuntimeContext::init(EngineConfig::default()).unwrap();
        let mut master = MasterControl::new(&context).unwrap();

        let transform_seen = Arc::new(AtomicUsize::new(0));
        let behavior_seen = Arc::new(AtomicUsize::new(0));
        master
            .register_structure(Box::new(CountingStructure {
                kind: ThreadKinds::TRANSFORM,
                seen: transform_seen.clone(),
            }))
            .unwrap();
        master
            .register_structure(Box::new(CountingStructure {
                kind: ThreadKinds::BEHAVIOR,
                seen: behavior_seen.clone(),
            }))
            .unwrap();

        master.send_message(
            MessageKind::TransformChanged,
            ThreadKinds::TRANSFORM,
            Vec::new(),
        );
        master.pump_frame();

        // Transform got its change; behavior got only the frame tick.
        wait_for(&transform_seen, 1);
        wait_for(&behavior_seen, 1);
        assert_eq!(transform_seen.load(Ordering::SeqCst), 1);
        assert_eq!(behavior_seen.load(Ordering::SeqCst), 1);

        master.shutdown();
        context.shutdown();
    }

    #[test]
    fn test_broadcast_reaches_every_recipient() {
        let context = RuntimeContext::init(EngineConfig::default()).unwrap();
        let mut master = MasterControl::new(&context).unwrap();

        let transform_seen = Arc::new(AtomicUsize::new(0));
        let geometry_seen = Arc::new(AtomicUsize::new(0));
        master
            .register_structure(Box::new(CountingStructure {
                kind: ThreadKinds::TRANSFORM,
                seen: transform_seen.clone(),
            }))
            .unwrap();
        master
            .register_structure(Box::new(CountingStructure {
                kind: ThreadKinds::GEOMETRY,
                seen: geometry_seen.clone(),
            }))
            .unwrap();

        master.send_message(
            MessageKind::NodesInserted,
            ThreadKinds::TRANSFORM | ThreadKinds::GEOMETRY,
            Vec::new(),
        );
        master.pump_frame();

        wait_for(&transform_seen, 1);
        wait_for(&geometry_seen, 1);
        assert_eq!(transform_seen.load(Ordering::SeqCst), 1);
        assert_eq!(geometry_seen.load(Ordering::SeqCst), 1);

        master.shutdown();
        context.shutdown();
    }
}
