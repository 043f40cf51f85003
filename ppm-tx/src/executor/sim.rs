/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! In-memory execution engine.
//!
//! [`SimExecutor`] keeps every waveform it is asked to create and logs every
//! transmit, so tests (and `--backend sim` dry runs) can observe exactly what
//! the core asked the hardware to do.  The state lives behind an `Arc` so a
//! [`SimHandle`] kept by the caller still sees it after the executor itself
//! has been moved into a [`PpmEngine`](crate::engine::PpmEngine).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{ExecutorError, TransmitMode, WaveExecutor, WaveId};
use crate::pulse::{Level, PulseTrain};

/// One recorded transmit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimTransmit {
    pub id: WaveId,
    pub mode: TransmitMode,
    /// Segment durations of the waveform that was sent.
    pub durations: Vec<u32>,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u32,
    capacity: Option<usize>,
    live: BTreeMap<WaveId, PulseTrain>,
    created: usize,
    released: Vec<WaveId>,
    transmits: Vec<SimTransmit>,
    playing: Option<WaveId>,
    halts: usize,
    fail_transmits: usize,
    fail_creates: usize,
    levels: Vec<(u32, Level)>,
}

/// Cloneable view onto the simulator state.
#[derive(Debug, Clone, Default)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles currently allocated.
    pub fn live_ids(&self) -> Vec<WaveId> {
        self.lock().live.keys().copied().collect()
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Total number of waveforms ever created.
    pub fn created_count(&self) -> usize {
        self.lock().created
    }

    /// Handles released so far, in release order.
    pub fn released(&self) -> Vec<WaveId> {
        self.lock().released.clone()
    }

    pub fn transmits(&self) -> Vec<SimTransmit> {
        self.lock().transmits.clone()
    }

    pub fn transmit_count(&self) -> usize {
        self.lock().transmits.len()
    }

    /// The waveform currently looping, if any.
    pub fn playing(&self) -> Option<WaveId> {
        self.lock().playing
    }

    pub fn halt_count(&self) -> usize {
        self.lock().halts
    }

    /// Every `set_output_level` call in order.
    pub fn levels(&self) -> Vec<(u32, Level)> {
        self.lock().levels.clone()
    }

    /// Pulse train behind a live handle.
    pub fn train(&self, id: WaveId) -> Option<PulseTrain> {
        self.lock().live.get(&id).cloned()
    }

    /// Make the next `n` waveform creations fail with
    /// [`ExecutorError::ResourceExhausted`].
    pub fn fail_next_creates(&self, n: usize) {
        self.lock().fail_creates = n;
    }

    /// Make the next `n` transmits fail with [`ExecutorError::Busy`].
    pub fn fail_next_transmits(&self, n: usize) {
        self.lock().fail_transmits = n;
    }
}

/// Execution engine that lives entirely in memory.
#[derive(Debug, Default)]
pub struct SimExecutor {
    handle: SimHandle,
}

impl SimExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of simultaneously live waveforms.
    pub fn with_capacity(capacity: usize) -> Self {
        let sim = Self::default();
        sim.handle.lock().capacity = Some(capacity);
        sim
    }

    /// A handle for inspecting the simulator after it has been moved.
    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl WaveExecutor for SimExecutor {
    fn create_waveform(
        &mut self,
        train: &PulseTrain,
        _gpio: u32,
    ) -> Result<WaveId, ExecutorError> {
        let mut st = self.handle.lock();
        if st.fail_creates > 0 {
            st.fail_creates -= 1;
            return Err(ExecutorError::ResourceExhausted { code: -70 });
        }
        if let Some(cap) = st.capacity {
            if st.live.len() >= cap {
                return Err(ExecutorError::ResourceExhausted { code: -70 });
            }
        }
        let id = WaveId(st.next_id);
        st.next_id += 1;
        st.created += 1;
        st.live.insert(id, train.clone());
        trace!(%id, "sim: waveform created");
        Ok(id)
    }

    fn transmit(&mut self, id: WaveId, mode: TransmitMode) -> Result<(), ExecutorError> {
        let mut st = self.handle.lock();
        if st.fail_transmits > 0 {
            st.fail_transmits -= 1;
            return Err(ExecutorError::Busy);
        }
        let durations = st
            .live
            .get(&id)
            .ok_or(ExecutorError::UnknownWave(id))?
            .durations();
        st.transmits.push(SimTransmit {
            id,
            mode,
            durations,
        });
        st.playing = match mode {
            TransmitMode::Repeat => Some(id),
            TransmitMode::Once => None,
        };
        trace!(%id, ?mode, "sim: transmit");
        Ok(())
    }

    fn is_transmitting(&mut self) -> Result<bool, ExecutorError> {
        Ok(self.handle.lock().playing.is_some())
    }

    fn release_waveform(&mut self, id: WaveId) -> Result<(), ExecutorError> {
        let mut st = self.handle.lock();
        st.live.remove(&id).ok_or(ExecutorError::UnknownWave(id))?;
        st.released.push(id);
        trace!(%id, "sim: waveform released");
        Ok(())
    }

    fn halt(&mut self) -> Result<(), ExecutorError> {
        let mut st = self.handle.lock();
        st.playing = None;
        st.halts += 1;
        Ok(())
    }

    fn set_output_level(&mut self, gpio: u32, level: Level) -> Result<(), ExecutorError> {
        self.handle.lock().levels.push((gpio, level));
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::build;

    fn train() -> PulseTrain {
        build(&[1_500, 1_500], 100, 10_000).unwrap()
    }

    #[test]
    fn create_and_release_track_live_set() {
        let mut sim = SimExecutor::new();
        let h = sim.handle();

        let a = sim.create_waveform(&train(), 6).unwrap();
        let b = sim.create_waveform(&train(), 6).unwrap();
        assert_ne!(a, b);
        assert_eq!(h.live_ids(), vec![a, b]);

        sim.release_waveform(a).unwrap();
        assert_eq!(h.live_ids(), vec![b]);
        assert_eq!(h.released(), vec![a]);
        assert_eq!(h.created_count(), 2);
    }

    #[test]
    fn capacity_limit_reports_resource_exhaustion() {
        let mut sim = SimExecutor::with_capacity(1);
        sim.create_waveform(&train(), 6).unwrap();
        assert!(matches!(
            sim.create_waveform(&train(), 6),
            Err(ExecutorError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn injected_create_failure_then_recovers() {
        let mut sim = SimExecutor::new();
        let h = sim.handle();
        h.fail_next_creates(1);
        assert!(matches!(
            sim.create_waveform(&train(), 6),
            Err(ExecutorError::ResourceExhausted { code: -70 })
        ));
        assert_eq!(h.created_count(), 0);
        sim.create_waveform(&train(), 6).unwrap();
        assert_eq!(h.live_count(), 1);
    }

    #[test]
    fn injected_busy_fails_then_recovers() {
        let mut sim = SimExecutor::new();
        let h = sim.handle();
        let id = sim.create_waveform(&train(), 6).unwrap();

        h.fail_next_transmits(1);
        assert!(matches!(
            sim.transmit(id, TransmitMode::Repeat),
            Err(ExecutorError::Busy)
        ));
        assert!(!sim.is_transmitting().unwrap());

        sim.transmit(id, TransmitMode::Repeat).unwrap();
        assert!(sim.is_transmitting().unwrap());
        assert_eq!(h.playing(), Some(id));
        assert_eq!(h.transmit_count(), 1);
    }

    #[test]
    fn unknown_wave_is_an_error() {
        let mut sim = SimExecutor::new();
        assert!(matches!(
            sim.transmit(WaveId(42), TransmitMode::Once),
            Err(ExecutorError::UnknownWave(WaveId(42)))
        ));
        assert!(sim.release_waveform(WaveId(42)).is_err());
    }

    #[test]
    fn halt_stops_playback() {
        let mut sim = SimExecutor::new();
        let id = sim.create_waveform(&train(), 6).unwrap();
        sim.transmit(id, TransmitMode::Repeat).unwrap();
        sim.halt().unwrap();
        assert!(!sim.is_transmitting().unwrap());
        assert_eq!(sim.handle().halt_count(), 1);
    }
}
