//! A cancellable per-lobby phase timer (§4.5, §9 "Per-lobby timers").
//!
//! Modeled as a spawned task with a deadline sleep; cancellation is
//! `JoinHandle::abort`, which is idempotent and race-free with the timer's
//! own fire — dropping or replacing a `LobbyTimer` always cancels it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct LobbyTimer {
    handle: JoinHandle<()>,
}

impl LobbyTimer {
    pub fn spawn<F>(duration: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_fire.await;
        });
        LobbyTimer { handle }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for LobbyTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
