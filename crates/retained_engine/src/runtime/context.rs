//! Runtime context
//!
//! The explicitly constructed replacement for global singleton state:
//! one context owns the message pool, the change-time clock, the timer
//! queue, and the view-state lock, with an explicit init/shutdown pair.
//! Everything that used to be a static is reached through this object.

use crate::config::{ConfigError, EngineConfig};
use crate::foundation::time::FrameClock;
use crate::runtime::timer::TimerQueue;
use crate::runtime::view_lock::ViewStateLock;
use crate::structures::message::MessagePool;
use std::sync::Arc;

/// Shared runtime services for one engine instance
pub struct RuntimeContext {
    config: EngineConfig,
    pool: Arc<MessagePool>,
    clock: Arc<FrameClock>,
    timer_queue: Arc<TimerQueue>,
    view_lock: Arc<ViewStateLock>,
}

impl RuntimeContext {
    /// Validate the configuration and build the shared services
    pub fn init(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "runtime context initialized (culling: {}, message pool: {})",
            config.frustum_culling,
            config.messages.pool_capacity
        );
        Ok(Self {
            pool: Arc::new(MessagePool::new(config.messages.pool_capacity)),
            clock: Arc::new(FrameClock::new()),
            timer_queue: Arc::new(TimerQueue::new()),
            view_lock: Arc::new(ViewStateLock::new()),
            config,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared change-message pool
    pub fn message_pool(&self) -> &Arc<MessagePool> {
        &self.pool
    }

    /// The change-time and frame clock
    pub fn clock(&self) -> &Arc<FrameClock> {
        &self.clock
    }

    /// The wakeup deadline queue
    pub fn timer_queue(&self) -> &Arc<TimerQueue> {
        &self.timer_queue
    }

    /// The view derived-state lock
    pub fn view_lock(&self) -> &Arc<ViewStateLock> {
        &self.view_lock
    }

    /// Tear the context down, releasing any blocked timer waiter
    pub fn shutdown(self) {
        self.timer_queue.shutdown();
        log::info!("runtime context shut down");
    }
}
