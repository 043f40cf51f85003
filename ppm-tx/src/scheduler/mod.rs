//! Periodic frame transmitter.
//!
//! [`FrameScheduler`] runs one tokio task that, once per frame period, asks
//! its [`FrameSource`] to transmit the newest pending waveform.  The wake-up
//! time of every cycle comes from a [`Cadence`], which re-anchors on each
//! send so scheduling latency never accumulates into frame drift.
//!
//! # State machine
//! ```text
//!   Idle ──start()──► Running ──stop()──► Stopping ──task exited, release──► Stopped
//!     └───────────────────────stop()──────────┘
//! ```
//! `stop()` is idempotent: concurrent or repeated callers queue on an async
//! mutex and all return once the scheduler is `Stopped`.
//!
//! # Example
//! ```rust,ignore
//! let scheduler = FrameScheduler::new(Duration::from_millis(20));
//! scheduler.start(source).await?;
//! // ...
//! scheduler.stop(|| release_everything()).await;
//! ```

pub mod cadence;

pub use cadence::Cadence;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::engine::EngineError;
use crate::executor::{ExecutorError, WaveId};

// ── Constants ─────────────────────────────────────────────────────────────────

/// How long `stop()` waits for the loop to acknowledge before aborting it.
pub const STOP_GRACE: Duration = Duration::from_millis(250);

// ── FrameSource ───────────────────────────────────────────────────────────────

/// What the scheduler transmits from.
pub trait FrameSource: Send + Sync + 'static {
    /// Transmit the newest pending waveform, if there is one.
    ///
    /// `Ok(None)` means nothing was pending.  On `Err` the waveform must stay
    /// pending so a later cycle can retry it.
    fn transmit_pending(&self) -> Result<Option<WaveId>, ExecutorError>;
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, never started.
    Idle,
    /// Transmit loop active.
    Running,
    /// Stop requested; waiting for the loop and releasing resources.
    Stopping,
    /// Terminal.
    Stopped,
}

struct RunningTask {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

// ── FrameScheduler ────────────────────────────────────────────────────────────

pub struct FrameScheduler {
    period: Duration,
    state: Arc<Mutex<SchedulerState>>,
    sends: Arc<AtomicU64>,
    running: tokio::sync::Mutex<Option<RunningTask>>,
}

impl FrameScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            sends: Arc::new(AtomicU64::new(0)),
            running: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: SchedulerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Frames successfully handed to the engine so far.
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::Relaxed)
    }

    /// Spawn the transmit loop.  Only valid from `Idle`.
    ///
    /// # Errors
    /// [`EngineError::Lifecycle`] if the scheduler was already started or
    /// stopped.
    pub async fn start(&self, source: Arc<dyn FrameSource>) -> Result<(), EngineError> {
        let mut running = self.running.lock().await;
        let state = self.state();
        if state != SchedulerState::Idle {
            return Err(EngineError::Lifecycle {
                action: "start",
                state,
            });
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            source,
            self.period,
            stop_rx,
            Arc::clone(&self.sends),
        ));
        *running = Some(RunningTask { stop_tx, task });
        self.set_state(SchedulerState::Running);

        info!(period_us = self.period.as_micros() as u64, "frame scheduler started");
        Ok(())
    }

    /// Stop the loop, then run `release` exactly once before reporting
    /// `Stopped`.
    ///
    /// Safe before `start()`, safe to repeat, safe to call concurrently.
    pub async fn stop<F>(&self, release: F)
    where
        F: FnOnce(),
    {
        let mut running = self.running.lock().await;
        if self.state() == SchedulerState::Stopped {
            debug!("frame scheduler already stopped");
            return;
        }
        self.set_state(SchedulerState::Stopping);

        if let Some(RunningTask { stop_tx, mut task }) = running.take() {
            // The receiver may already be gone if the loop exited on its own.
            let _ = stop_tx.send(true);
            match timeout(STOP_GRACE, &mut task).await {
                Ok(Ok(())) => debug!("frame scheduler loop acknowledged stop"),
                Ok(Err(e)) => warn!(error = %e, "frame scheduler task ended abnormally"),
                Err(_) => {
                    warn!(
                        grace_ms = STOP_GRACE.as_millis() as u64,
                        "frame scheduler did not stop in time, aborting"
                    );
                    task.abort();
                }
            }
        }

        release();
        self.set_state(SchedulerState::Stopped);
        info!(sends = self.sends(), "frame scheduler stopped");
    }
}

/// The transmit loop.  Exits when the stop flag is raised or its sender is
/// dropped.
async fn run_loop(
    source: Arc<dyn FrameSource>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
    sends: Arc<AtomicU64>,
) {
    let mut cadence = Cadence::new(period);

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let now = Instant::now();
        let wake = match source.transmit_pending() {
            Ok(Some(id)) => {
                let n = sends.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(%id, sends = n, "frame sent");
                cadence.on_send(now)
            }
            Ok(None) => cadence.on_idle(now),
            Err(e) => {
                warn!(error = %e, "transmit failed, retrying at next frame boundary");
                cadence.on_idle(now)
            }
        };

        tokio::select! {
            _ = sleep_until(wake) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!("frame scheduler loop exited");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize};

    const P: Duration = Duration::from_millis(20);

    /// Source that always (or never) has a frame and records call times.
    #[derive(Default)]
    struct MockSource {
        has_frame: AtomicBool,
        fail_next: AtomicUsize,
        next_id: AtomicU32,
        calls: Mutex<Vec<Instant>>,
        sent: Mutex<Vec<Instant>>,
    }

    impl MockSource {
        fn with_frames() -> Arc<Self> {
            let s = Self::default();
            s.has_frame.store(true, Ordering::SeqCst);
            Arc::new(s)
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn sent(&self) -> Vec<Instant> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl FrameSource for MockSource {
        fn transmit_pending(&self) -> Result<Option<WaveId>, ExecutorError> {
            let now = Instant::now();
            self.calls.lock().unwrap().push(now);
            if !self.has_frame.load(Ordering::SeqCst) {
                return Ok(None);
            }
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(ExecutorError::Busy);
            }
            self.sent.lock().unwrap().push(now);
            Ok(Some(WaveId(self.next_id.fetch_add(1, Ordering::SeqCst))))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sends_once_per_frame_period() {
        let source = MockSource::with_frames();
        let sched = FrameScheduler::new(P);
        sched.start(source.clone()).await.unwrap();
        assert_eq!(sched.state(), SchedulerState::Running);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        sched.stop(|| {}).await;

        let sent = source.sent();
        assert!((50..=51).contains(&sent.len()), "sent {} frames", sent.len());
        assert_eq!(sched.sends(), sent.len() as u64);
        for pair in sent.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= P && gap <= P + Duration::from_millis(1), "gap {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_source_is_polled_once_per_period() {
        let source = Arc::new(MockSource::default());
        let sched = FrameScheduler::new(P);
        sched.start(source.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        sched.stop(|| {}).await;

        assert_eq!(sched.sends(), 0);
        assert!((10..=11).contains(&source.calls()), "calls {}", source.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_engine_skips_cycle_and_retries() {
        let source = MockSource::with_frames();
        source.fail_next.store(2, Ordering::SeqCst);
        let sched = FrameScheduler::new(P);
        sched.start(source.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sched.sends(), 0, "first two attempts fail");

        tokio::time::sleep(Duration::from_millis(100)).await;
        sched.stop(|| {}).await;
        assert!(sched.sends() >= 4);
        // no tight retry: one call per period at most
        assert!(source.calls() <= 8, "calls {}", source.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn no_transmit_after_stop_returns() {
        let source = MockSource::with_frames();
        let sched = FrameScheduler::new(P);
        sched.start(source.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(55)).await;

        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        sched.stop(move || flag.store(true, Ordering::SeqCst)).await;
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(sched.state(), SchedulerState::Stopped);

        let calls = source.calls();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_releases_once() {
        let sched = FrameScheduler::new(P);
        sched.start(MockSource::with_frames()).await.unwrap();

        let releases = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let r = Arc::clone(&releases);
            sched.stop(move || {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .await;
            assert_eq!(sched.state(), SchedulerState::Stopped);
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_before_start_is_allowed() {
        let sched = FrameScheduler::new(P);
        sched.stop(|| {}).await;
        assert_eq!(sched.state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn start_requires_idle() {
        let sched = FrameScheduler::new(P);
        sched.start(Arc::new(MockSource::default())).await.unwrap();
        let err = sched
            .start(Arc::new(MockSource::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Lifecycle {
                state: SchedulerState::Running,
                ..
            }
        ));

        sched.stop(|| {}).await;
        let err = sched
            .start(Arc::new(MockSource::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Lifecycle {
                state: SchedulerState::Stopped,
                ..
            }
        ));
    }
}
