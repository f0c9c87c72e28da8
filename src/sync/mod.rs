/// Synchronization engine.
///
/// The scheduler drives everything: one cycle rebuilds markets, discovers
/// users over historical events (chunked, through the retry layer) and
/// refreshes their positions in bounded aggregated batches, then the whole
/// snapshot is republished and the loop sleeps.
pub mod batch;
pub mod config;
pub mod registry;
pub mod retry;
pub mod scanner;
pub mod scheduler;


pub use batch::{BatchReader, RefreshStrategy};
pub use config::SyncConfig;
pub use registry::UserRegistry;
pub use retry::RetryPolicy;
pub use scanner::BlockRangeScanner;
pub use scheduler::{CycleKind, SyncScheduler};

use tokio::sync::watch;

/// Cooperative shutdown signal, checked at every chunk boundary, batch
/// boundary and backoff sleep.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Owning side of the shutdown signal. Dropping the handle also signals
/// shutdown.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once shutdown is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// A signal that never fires; keeps test call sites short.
    pub fn never() -> Self {
        let (handle, shutdown) = shutdown_channel();
        std::mem::forget(handle);
        shutdown
    }
}

#[cfg(test)]
mod shutdown_tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let (handle, shutdown) = shutdown_channel();
        assert!(!shutdown.is_cancelled());

        handle.shutdown();
        assert!(shutdown.is_cancelled());
        shutdown.cancelled().await;
    }

    #[tokio::test]
    async fn test_dropped_handle_counts_as_shutdown() {
        let (handle, shutdown) = shutdown_channel();
        drop(handle);
        assert!(shutdown.is_cancelled());
    }
}
