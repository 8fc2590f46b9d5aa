//! Flush policies and the background flush worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Controls when collections get written to disk.
///
/// Whatever the policy, every collection is written on
/// [`shutdown`](crate::RecordStoreHandle::shutdown).
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub enum FlushPolicy {
    /// Write the touched collection after every successful mutation, before
    /// its guard is released. Safest, but most I/O.
    Immediate,
    /// Background thread writes dirty collections on a timer and whenever a
    /// mutation pokes it.
    Async(Duration),
    /// Only write on `flush()` or shutdown.
    #[default]
    Manual,
}

/// Background thread that calls a flush closure on a timer or when poked.
/// Joins the thread on drop so nothing leaks.
pub struct AsyncFlushWorker {
    stop: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AsyncFlushWorker {
    /// Spawn a worker reading pokes from `rx`. The store keeps the sender
    /// side; dropping it tells the worker to exit without waiting out the
    /// interval.
    pub fn start<F>(interval: Duration, flush_fn: F, rx: mpsc::Receiver<()>) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let join_handle = thread::spawn(move || loop {
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            match rx.recv_timeout(interval) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Timeout) => flush_fn(),
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });

        Self {
            stop,
            join_handle: Some(join_handle),
        }
    }

    /// Ask the thread to exit and wait for it. The current flush, if any,
    /// finishes first.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.join_handle.take() {
            if h.join().is_err() {
                tracing::error!("flush worker thread panicked");
            }
        }
    }
}

impl Drop for AsyncFlushWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AsyncFlushWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFlushWorker")
            .field("running", &self.join_handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_survives_panicking_flush() {
        let (tx, rx) = mpsc::sync_channel(0);
        let mut worker = AsyncFlushWorker::start(
            Duration::from_secs(60),
            || panic!("flush blew up"),
            rx,
        );
        tx.send(()).unwrap();
        worker.stop();
        assert_eq!(format!("{worker:?}"), "AsyncFlushWorker { running: false }");
    }
}
