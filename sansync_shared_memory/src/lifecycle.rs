//! Producer-side lifecycle: segment creation, drain loop, teardown.
//!
//! ```text
//! Uninitialized ──initialize──► Initializing ──► Ready
//!       ▲                            │ failure      │ cleanup
//!       └────────────────────────────┴◄── ShuttingDown
//! ```
//!
//! One [`Lifecycle`] owns one segment. Every access to the mapped bytes and to
//! the phase goes through a single exclusive lock, shared with the drain loop.

use crate::access::AccessPolicyFactory;
use crate::channel::{CommandChannel, StateChannel};
use crate::drain::{CommandObserver, DiscardObserver, DrainLoop, DrainStats};
use crate::error::{ShmError, ShmResult};
use crate::layout::SegmentLayout;
use crate::segment::SharedSegment;
use parking_lot::Mutex;
use sansync::config::SegmentConfig;
use sansync::shm::consts::SEGMENT_SIZE;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Nothing mapped, no drain loop
    Uninitialized,
    /// Initialize in progress
    Initializing,
    /// Segment mapped and drain loop running
    Ready,
    /// Cleanup in progress
    ShuttingDown,
}

impl LifecyclePhase {
    /// Lowercase name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Uninitialized => "uninitialized",
            LifecyclePhase::Initializing => "initializing",
            LifecyclePhase::Ready => "ready",
            LifecyclePhase::ShuttingDown => "shutting down",
        }
    }
}

/// State guarded by the lifecycle lock
pub(crate) struct LifecycleState {
    pub(crate) phase: LifecyclePhase,
    pub(crate) segment: Option<SharedSegment>,
    drain: Option<DrainLoop>,
}

/// Lock shared between callers and the drain thread
pub(crate) type SharedState = Arc<Mutex<LifecycleState>>;

/// Owns the producer side of one segment.
///
/// `initialize` is idempotent while ready; `cleanup` is a no-op unless ready
/// and runs automatically on drop.
pub struct Lifecycle {
    config: SegmentConfig,
    observer: Arc<dyn CommandObserver>,
    state: SharedState,
    stats: Arc<DrainStats>,
    creations: AtomicU64,
}

impl Lifecycle {
    /// Lifecycle that discards drained commands.
    pub fn new(config: SegmentConfig) -> Self {
        Self::with_observer(config, Arc::new(DiscardObserver))
    }

    /// Lifecycle handing drained commands to `observer`.
    pub fn with_observer(config: SegmentConfig, observer: Arc<dyn CommandObserver>) -> Self {
        Self {
            config,
            observer,
            state: Arc::new(Mutex::new(LifecycleState {
                phase: LifecyclePhase::Uninitialized,
                segment: None,
                drain: None,
            })),
            stats: Arc::new(DrainStats::default()),
            creations: AtomicU64::new(0),
        }
    }

    /// Create the segment and start the drain loop.
    ///
    /// Returns immediately when already ready. On failure everything acquired
    /// so far is released and the phase returns to `Uninitialized`.
    pub fn initialize(&self) -> ShmResult<()> {
        let mut state = self.state.lock();
        match state.phase {
            LifecyclePhase::Ready => {
                tracing::debug!("Segment {} already initialized", self.config.name);
                return Ok(());
            }
            LifecyclePhase::Uninitialized => {}
            phase => {
                return Err(ShmError::InvalidState {
                    phase: phase.as_str(),
                });
            }
        }

        state.phase = LifecyclePhase::Initializing;
        tracing::info!("Initializing shared memory segment {}", self.config.name);

        match self.acquire(&mut state) {
            Ok(()) => {
                state.phase = LifecyclePhase::Ready;
                self.creations.fetch_add(1, Ordering::Relaxed);
                tracing::info!("Segment {} ready", self.config.name);
                Ok(())
            }
            Err(e) => {
                if let Some(mut segment) = state.segment.take() {
                    segment.close();
                }
                state.phase = LifecyclePhase::Uninitialized;
                tracing::error!(
                    "Failed to initialize segment {}: {} (os error {:?})",
                    self.config.name,
                    e,
                    e.os_code()
                );
                Err(e)
            }
        }
    }

    fn acquire(&self, state: &mut LifecycleState) -> ShmResult<()> {
        let descriptor = AccessPolicyFactory::build(self.config.access_policy)?;
        state.segment = Some(SharedSegment::create(
            &self.config.name,
            SEGMENT_SIZE,
            &descriptor,
        )?);

        let drain = DrainLoop::start(
            Arc::clone(&self.state),
            self.config.drain_interval(),
            Arc::clone(&self.observer),
            Arc::clone(&self.stats),
        )?;
        state.drain = Some(drain);
        Ok(())
    }

    /// Stop the drain loop and release the segment. No-op unless ready.
    pub fn cleanup(&self) {
        let drain = {
            let mut state = self.state.lock();
            if state.phase != LifecyclePhase::Ready {
                return;
            }
            state.phase = LifecyclePhase::ShuttingDown;
            state.drain.take()
        };

        // Joined without the lock: the loop needs it to finish its iteration
        if let Some(mut drain) = drain {
            drain.stop();
        }

        let mut state = self.state.lock();
        if let Some(mut segment) = state.segment.take() {
            segment.close();
        }
        state.phase = LifecyclePhase::Uninitialized;
        tracing::info!("Segment {} cleaned up", self.config.name);
    }

    /// Store a command for the consumer side, replacing any pending one.
    ///
    /// See [`CommandChannel`] for the delivery guarantee.
    pub fn write_command(&self, command: &[u8]) -> ShmResult<()> {
        self.with_layout(|layout| CommandChannel::write(layout, command))?
    }

    /// Copy the current state snapshot into `out`; `Ok(0)` means no state.
    pub fn read_state(&self, out: &mut [u8]) -> ShmResult<usize> {
        self.with_layout(|layout| StateChannel::read(layout, out))?
    }

    /// Run `f` over the mapped layout under the lifecycle lock.
    pub fn with_layout<R>(&self, f: impl FnOnce(&mut SegmentLayout<'_>) -> R) -> ShmResult<R> {
        let mut state = self.state.lock();
        if state.phase != LifecyclePhase::Ready {
            return Err(ShmError::NotReady);
        }
        let segment = state.segment.as_mut().ok_or(ShmError::NotReady)?;
        let mut layout = segment.layout_mut()?;
        Ok(f(&mut layout))
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.state.lock().phase
    }

    /// True while the segment is mapped and the drain loop runs.
    pub fn is_ready(&self) -> bool {
        self.phase() == LifecyclePhase::Ready
    }

    /// Number of successful segment creations over this lifecycle's life.
    pub fn segment_creations(&self) -> u64 {
        self.creations.load(Ordering::Relaxed)
    }

    /// Drain loop counters.
    pub fn drain_stats(&self) -> &DrainStats {
        &self.stats
    }

    /// Segment configuration.
    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.cleanup();
    }
}
