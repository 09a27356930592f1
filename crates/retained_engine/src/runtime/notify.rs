//! Render-error notification thread
//!
//! The render thread cannot unwind mid-frame, so rendering runtime
//! errors are posted to a channel and dispatched asynchronously to
//! registered listeners by a dedicated thread.

use crossbeam::channel::{unbounded, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// A rendering runtime error, reported off the render thread
#[derive(Debug, Clone)]
pub struct RenderError {
    /// Canvas the error occurred on
    pub canvas: u32,
    /// Human-readable description
    pub message: String,
}

/// Receiver of asynchronously dispatched render errors
pub trait RenderErrorListener: Send {
    /// Called on the notification thread for each reported error
    fn on_render_error(&self, error: &RenderError);
}

/// Dedicated dispatch thread for render errors
pub struct NotificationThread {
    sender: Option<Sender<RenderError>>,
    listeners: Arc<Mutex<Vec<Box<dyn RenderErrorListener>>>>,
    handle: Option<JoinHandle<()>>,
}

impl NotificationThread {
    /// Spawn the notification thread
    pub fn spawn() -> std::io::Result<Self> {
        let listeners: Arc<Mutex<Vec<Box<dyn RenderErrorListener>>>> =
            Arc::new(Mutex::new(Vec::new()));
        let (sender, receiver) = unbounded::<RenderError>();
        let worker_listeners = Arc::clone(&listeners);

        let handle = std::thread::Builder::new()
            .name("notification".to_string())
            .spawn(move || {
                log::debug!("notification thread started");
                while let Ok(error) = receiver.recv() {
                    log::warn!("render error on canvas {}: {}", error.canvas, error.message);
                    for listener in worker_listeners.lock().unwrap().iter() {
                        listener.on_render_error(&error);
                    }
                }
                log::debug!("notification thread stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            listeners,
            handle: Some(handle),
        })
    }

    /// Register a listener for future errors
    pub fn add_listener(&self, listener: Box<dyn RenderErrorListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// A handle the render thread posts errors through
    pub fn notifier(&self) -> Option<Sender<RenderError>> {
        self.sender.clone()
    }
}

impl Drop for NotificationThread {
    fn drop(&mut self) {
        // Dropping the sender ends the dispatch loop.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
