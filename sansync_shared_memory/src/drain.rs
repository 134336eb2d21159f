//! Background drain loop consuming pending commands.
//!
//! Every interval the loop takes the shared lock, and if a command is pending
//! copies it out and zeroes the command region. The copy is handed to a
//! [`CommandObserver`] after the lock has been released. Integrations that
//! interpret commands implement the observer instead of editing the loop.
//!
//! The loop is stopped cooperatively: [`DrainLoop::stop`] raises a flag, wakes
//! the thread and joins it. The thread only checks the flag while it does not
//! hold the lock, so stopping can never strand the lock.

use crate::channel::CommandChannel;
use crate::error::{ShmError, ShmResult};
use crate::lifecycle::SharedState;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Receives every command the drain loop consumes.
pub trait CommandObserver: Send + Sync {
    /// Called once per drained command, outside the segment lock.
    fn on_command(&self, command: &[u8]);
}

impl<F> CommandObserver for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn on_command(&self, command: &[u8]) {
        self(command)
    }
}

/// Default observer: logs and drops the command.
pub struct DiscardObserver;

impl CommandObserver for DiscardObserver {
    fn on_command(&self, command: &[u8]) {
        tracing::debug!(
            "Drained command ({} bytes): {}",
            command.len(),
            String::from_utf8_lossy(command)
        );
    }
}

/// Counters updated by the drain thread.
#[derive(Debug, Default)]
pub struct DrainStats {
    polls: AtomicU64,
    drained: AtomicU64,
}

impl DrainStats {
    /// Completed polling iterations.
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Commands consumed.
    pub fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }
}

/// Handle on the running drain thread.
pub struct DrainLoop {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DrainLoop {
    /// Spawn the drain thread over `state`.
    pub(crate) fn start(
        state: SharedState,
        interval: Duration,
        observer: Arc<dyn CommandObserver>,
        stats: Arc<DrainStats>,
    ) -> ShmResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("sansync-drain".to_string())
            .spawn(move || run(state, interval, observer, stats, thread_stop))
            .map_err(|source| ShmError::DrainStart { source })?;

        tracing::debug!("Drain loop started ({:?} interval)", interval);
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        handle.thread().unpark();
        if handle.join().is_err() {
            tracing::error!("Drain loop thread panicked");
        } else {
            tracing::debug!("Drain loop stopped");
        }
    }

}

impl Drop for DrainLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    state: SharedState,
    interval: Duration,
    observer: Arc<dyn CommandObserver>,
    stats: Arc<DrainStats>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        // Sleep outside the lock; stop() unparks us early
        std::thread::park_timeout(interval);
        if stop.load(Ordering::Acquire) {
            break;
        }

        let drained = {
            let mut state = state.lock();
            match state.segment.as_mut().map(|s| s.layout_mut()) {
                Some(Ok(mut layout)) => CommandChannel::take(&mut layout),
                _ => None,
            }
        };
        stats.polls.fetch_add(1, Ordering::Relaxed);

        if let Some(command) = drained {
            stats.drained.fetch_add(1, Ordering::Relaxed);
            // A failing observer must not end the loop while the lifecycle is ready
            if catch_unwind(AssertUnwindSafe(|| observer.on_command(&command))).is_err() {
                tracing::error!("Command observer panicked on {} byte command", command.len());
            }
        }
    }
}
