/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! PPM engine: update API and lifecycle controller.
//!
//! [`PpmEngine`] ties the pieces together:
//!
//! ```text
//! update_channel(s) ──► ChannelStore ──► pulse::build ──► WaveformPool ◄── FrameScheduler
//!                      └──────────── one mutex (SharedCore) ────────────┘      (tokio task)
//! ```
//!
//! The channel store, waveform pool and execution engine are only touched
//! under a single lock, so an update and a scheduler cycle never interleave.
//! Updates are synchronous: when `update_channel` returns `Ok`, the new
//! waveform is in the pool and will be picked up at the next frame boundary.
//! When the execution engine cannot create it, the widths stay stored and
//! the scheduler rebuilds the frame at its next wake.
//!
//! # Example
//! ```rust,ignore
//! let engine = PpmEngine::new(FrameConfig::default(), SimExecutor::new())?;
//! engine.start().await?;
//! engine.update_channel(2, 1_750)?;
//! engine.stop().await;
//! ```

pub mod error;

pub use error::{EngineError, UpdateError};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::channels::ChannelStore;
use crate::config::FrameConfig;
use crate::executor::{ExecutorError, TransmitMode, WaveExecutor, WaveId};
use crate::pool::WaveformPool;
use crate::pulse::{self, Level, PulseTrain};
use crate::scheduler::{FrameScheduler, FrameSource, SchedulerState};

// ── Shared core ───────────────────────────────────────────────────────────────

/// Everything the caller and the scheduler both mutate.
struct Core<E> {
    frame: FrameConfig,
    store: ChannelStore,
    pool: WaveformPool,
    executor: E,
    /// Set once `stop()` begins; no waveform is created or sent afterwards.
    halted: bool,
    /// Stored widths have no waveform yet (last rebuild failed).
    stale: bool,
}

impl<E: WaveExecutor> Core<E> {
    fn build_train(&self) -> Result<PulseTrain, pulse::PulseError> {
        pulse::build(
            self.store.widths(),
            self.frame.gap_us(),
            self.frame.frame_us(),
        )
    }

    /// Build the frame from the stored widths and submit it to the pool.
    fn rebuild(&mut self) -> Result<WaveId, UpdateError> {
        self.stale = true;
        let train = self.build_train()?;

        let evicted = self.pool.make_room();
        self.release(evicted);

        let id = self.executor.create_waveform(&train, self.frame.gpio())?;
        let evicted = self.pool.submit(id);
        self.release(evicted);
        self.stale = false;

        debug!(
            %id,
            widths = ?self.store.widths(),
            pending = self.pool.pending_len(),
            "waveform submitted"
        );
        Ok(id)
    }

    fn transmit_pending(&mut self) -> Result<Option<WaveId>, ExecutorError> {
        if self.halted {
            return Ok(None);
        }
        if self.stale {
            match self.rebuild() {
                Ok(id) => debug!(%id, "stored widths submitted on retry"),
                Err(UpdateError::Engine(e)) => return Err(e),
                Err(e) => warn!(error = %e, "stored widths cannot be rebuilt"),
            }
        }
        let Some(id) = self.pool.current_handle() else {
            return Ok(None);
        };

        self.executor.transmit(id, TransmitMode::Repeat)?;
        let retired = self.pool.retire_sent(id);
        self.release(retired);
        Ok(Some(id))
    }

    fn release(&mut self, ids: Vec<WaveId>) {
        for id in ids {
            if let Err(e) = self.executor.release_waveform(id) {
                warn!(%id, error = %e, "failed to release waveform");
            }
        }
    }

    /// Halt transmission, free every waveform and park the line low.
    fn shutdown(&mut self) {
        self.halted = true;
        if let Err(e) = self.executor.halt() {
            warn!(error = %e, "failed to halt transmission");
        }
        match self.executor.is_transmitting() {
            Ok(true) => warn!("execution engine still reports an active transmission"),
            Ok(false) => {}
            Err(e) => debug!(error = %e, "transmit status unavailable"),
        }
        let all = self.pool.drain();
        let count = all.len();
        self.release(all);
        if let Err(e) = self
            .executor
            .set_output_level(self.frame.gpio(), Level::Low)
        {
            warn!(error = %e, "failed to park output low");
        }
        info!(released = count, "waveforms released");
    }
}

struct SharedCore<E>(Mutex<Core<E>>);

impl<E> SharedCore<E> {
    fn lock(&self) -> MutexGuard<'_, Core<E>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: WaveExecutor> FrameSource for SharedCore<E> {
    fn transmit_pending(&self) -> Result<Option<WaveId>, ExecutorError> {
        self.lock().transmit_pending()
    }
}

// ── PpmEngine ─────────────────────────────────────────────────────────────────

/// A PPM transmitter bound to one execution engine and one output GPIO.
pub struct PpmEngine<E: WaveExecutor> {
    frame: FrameConfig,
    core: Arc<SharedCore<E>>,
    scheduler: FrameScheduler,
}

impl<E: WaveExecutor> PpmEngine<E> {
    /// Create an engine in the `Idle` state.
    ///
    /// Every channel starts at the minimum width.  The output GPIO is forced
    /// low so the line is in a known state before the first frame.
    ///
    /// # Errors
    /// * [`EngineError::FrameOverflow`] if the channels cannot fit the frame
    ///   (prevented by [`FrameConfig::new`]'s clamping).
    /// * [`EngineError::Executor`] if the output cannot be configured.
    pub fn new(frame: FrameConfig, mut executor: E) -> Result<Self, EngineError> {
        let store = ChannelStore::new(frame.channels());
        pulse::build(store.widths(), frame.gap_us(), frame.frame_us())?;

        executor.set_output_level(frame.gpio(), Level::Low)?;

        info!(
            gpio = frame.gpio(),
            channels = frame.channels(),
            frame_us = frame.frame_us(),
            gap_us = frame.gap_us(),
            max_live_waves = frame.max_live_waves(),
            "PPM engine created"
        );

        let core = Core {
            frame,
            store,
            pool: WaveformPool::new(frame.max_live_waves()),
            executor,
            halted: false,
            stale: false,
        };

        Ok(Self {
            frame,
            core: Arc::new(SharedCore(Mutex::new(core))),
            scheduler: FrameScheduler::new(frame.frame_period()),
        })
    }

    // ── Update API ────────────────────────────────────────────────────────────

    /// Set one channel (clamped to the valid width range) and submit the
    /// resulting frame.
    ///
    /// An index outside `[0, channels)` is logged and ignored.
    pub fn update_channel(&self, index: usize, width_us: u32) -> Result<(), UpdateError> {
        let mut core = self.core.lock();
        if core.halted {
            warn!(index, width_us, "update after stop ignored");
            return Err(UpdateError::Stopped);
        }
        if let Err(e) = core.store.set(index, width_us) {
            warn!(error = %e, "channel update rejected");
            return Err(e);
        }
        core.rebuild().map(drop).map_err(|e| {
            warn!(index, error = %e, "channel stored but frame not submitted");
            e
        })
    }

    /// Replace every channel at once (each clamped) and submit one frame.
    ///
    /// `widths` must have exactly [`channel_count`](Self::channel_count)
    /// entries; anything else is logged and ignored.
    pub fn update_channels(&self, widths: &[u32]) -> Result<(), UpdateError> {
        let mut core = self.core.lock();
        if core.halted {
            warn!(count = widths.len(), "update after stop ignored");
            return Err(UpdateError::Stopped);
        }
        if let Err(e) = core.store.set_all(widths) {
            warn!(error = %e, "channel vector update rejected");
            return Err(e);
        }
        core.rebuild().map(drop).map_err(|e| {
            warn!(error = %e, "channels stored but frame not submitted");
            e
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Begin periodic transmission.
    ///
    /// If no frame has been submitted yet, the frame for the current widths is
    /// submitted first so the receiver sees a valid signal straight away.  If
    /// the execution engine cannot create it yet, the scheduler retries at
    /// every wake until it can.
    ///
    /// # Errors
    /// [`EngineError::Lifecycle`] unless the engine is `Idle`.
    pub async fn start(&self) -> Result<(), EngineError> {
        let state = self.scheduler.state();
        if state != SchedulerState::Idle {
            return Err(EngineError::Lifecycle {
                action: "start",
                state,
            });
        }

        {
            let mut core = self.core.lock();
            if core.halted {
                return Err(EngineError::Lifecycle {
                    action: "start",
                    state: SchedulerState::Stopping,
                });
            }
            if core.pool.is_empty() || core.stale {
                match core.rebuild() {
                    Ok(_) => {}
                    Err(UpdateError::Build(e)) => return Err(e.into()),
                    Err(e) => warn!(error = %e, "initial frame not submitted, retrying"),
                }
            }
        }

        let source: Arc<dyn FrameSource> = self.core.clone();
        self.scheduler.start(source).await
    }

    /// Stop transmitting and release every waveform.
    ///
    /// After this returns no further transmit is issued.  Safe to call before
    /// `start()`, repeatedly, and from several tasks at once.
    pub async fn stop(&self) {
        self.core.lock().halted = true;
        let core = Arc::clone(&self.core);
        self.scheduler.stop(move || core.lock().shutdown()).await;
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Frames handed to the execution engine since `start()`.
    pub fn sends(&self) -> u64 {
        self.scheduler.sends()
    }

    pub fn frame(&self) -> &FrameConfig {
        &self.frame
    }

    pub fn channel_count(&self) -> usize {
        self.frame.channels()
    }

    /// Snapshot of the stored channel widths.
    pub fn widths(&self) -> Vec<u32> {
        self.core.lock().store.widths().to_vec()
    }

    /// Pulse train for the stored widths.
    pub fn current_train(&self) -> Result<PulseTrain, pulse::PulseError> {
        self.core.lock().build_train()
    }

    /// Waveforms submitted but not yet sent.
    pub fn pending_waveforms(&self) -> usize {
        self.core.lock().pool.pending_len()
    }

    /// Waveforms the engine currently owns (pending and in flight).
    pub fn live_waveforms(&self) -> usize {
        self.core.lock().pool.live()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
