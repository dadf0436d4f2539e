//! Shutdown coordinator for graceful termination.
//!
//! A `Shutdown` is a one-shot, cloneable cancellation signal shared between
//! the engine, runs, loops, and the event channel. Waiters observe the signal
//! through a `tokio::sync::watch` channel, so `wait()` returns an owned future
//! that can be moved into spawned tasks and `tokio::select!` arms.

use tokio::sync::watch;

/// One-shot cancellation signal.
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// create a new shutdown coordinator in the "running" state
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
        }
    }

    /// signal termination; waking every waiter. Idempotent.
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    /// true once `shutdown` has been called
    pub fn is_terminated(&self) -> bool {
        *self.sender.borrow()
    }

    /// resolves when `shutdown` is called (immediately if it already was)
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            // wait_for returns Err only when the sender is dropped, which also
            // counts as termination
            let _ = receiver.wait_for(|terminated| *terminated).await;
        }
    }
}
