/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Waveform handle bookkeeping.
//!
//! [`WaveformPool`] only tracks ids; it never talks to the execution engine
//! itself.  Every operation that frees a handle returns it, and the caller
//! (holding the engine) releases it.
//!
//! ```text
//!                 submit            retire_sent             next retire_sent
//! pending [.., new] ───► scheduler ───► in_flight ───────────────► released
//!    │ evicted / superseded
//!    └─────────────────────────────────────────────────────────────► released
//! ```
//!
//! `capacity` bounds every handle the pool owns, the in-flight one
//! included.  The in-flight handle is never evicted; it is released once a
//! newer handle has been handed to the engine, which switches over at the
//! end of the running cycle.

use std::collections::VecDeque;

use crate::executor::WaveId;

/// Smallest usable capacity: the in-flight handle plus one pending.
pub const MIN_CAPACITY: usize = 2;

#[derive(Debug)]
pub struct WaveformPool {
    capacity: usize,
    /// Submitted but not yet sent, oldest first.
    pending: VecDeque<WaveId>,
    /// Last handle handed to the engine for transmission.
    in_flight: Option<WaveId>,
}

impl WaveformPool {
    /// Pool that owns at most `capacity` (≥ [`MIN_CAPACITY`]) handles.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            capacity,
            pending: VecDeque::with_capacity(capacity),
            in_flight: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Evict the oldest pending handles so one more fits.
    ///
    /// Called before a new waveform is created, so the engine never holds more
    /// than `capacity` waveforms even transiently.
    pub fn make_room(&mut self) -> Vec<WaveId> {
        let mut evicted = Vec::new();
        while self.live() >= self.capacity {
            match self.pending.pop_front() {
                Some(old) => evicted.push(old),
                None => break,
            }
        }
        evicted
    }

    /// Append a freshly created handle.  Returns anything evicted to respect
    /// the capacity (empty when [`make_room`](Self::make_room) ran first).
    pub fn submit(&mut self, id: WaveId) -> Vec<WaveId> {
        let evicted = self.make_room();
        self.pending.push_back(id);
        evicted
    }

    /// Newest unsent handle, the one the scheduler transmits next.
    pub fn current_handle(&self) -> Option<WaveId> {
        self.pending.back().copied()
    }

    /// Record that `id` has been handed to the engine.
    ///
    /// Returns the handles that can now be released: pending handles older
    /// than `id` (superseded, never sent) and the previous in-flight handle.
    pub fn retire_sent(&mut self, id: WaveId) -> Vec<WaveId> {
        let mut released = Vec::new();

        if let Some(pos) = self.pending.iter().position(|&p| p == id) {
            released.extend(self.pending.drain(..pos));
            self.pending.pop_front();
        }

        match self.in_flight.replace(id) {
            Some(old) if old != id => released.push(old),
            _ => {}
        }
        released
    }

    /// Unsent handles, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = WaveId> + '_ {
        self.pending.iter().copied()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight(&self) -> Option<WaveId> {
        self.in_flight
    }

    /// Number of handles the pool currently owns.
    pub fn live(&self) -> usize {
        self.pending.len() + usize::from(self.in_flight.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.live() == 0
    }

    /// Take every handle (shutdown).
    pub fn drain(&mut self) -> Vec<WaveId> {
        let mut all: Vec<WaveId> = self.in_flight.take().into_iter().collect();
        all.extend(self.pending.drain(..));
        all
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn w(n: u32) -> WaveId {
        WaveId(n)
    }

    #[test]
    fn three_submits_keep_two_most_recent() {
        let mut pool = WaveformPool::new(2);
        assert!(pool.submit(w(1)).is_empty());
        assert!(pool.submit(w(2)).is_empty());
        assert_eq!(pool.submit(w(3)), vec![w(1)]);

        assert_eq!(pool.pending().collect::<Vec<_>>(), vec![w(2), w(3)]);
        assert_eq!(pool.current_handle(), Some(w(3)));
    }

    #[test]
    fn make_room_evicts_before_create() {
        let mut pool = WaveformPool::new(2);
        pool.submit(w(1));
        pool.submit(w(2));
        assert_eq!(pool.make_room(), vec![w(1)]);
        assert_eq!(pool.pending_len(), 1);
        assert!(pool.submit(w(3)).is_empty());
        assert_eq!(pool.pending().collect::<Vec<_>>(), vec![w(2), w(3)]);
    }

    #[test]
    fn retire_sent_releases_superseded_pending() {
        let mut pool = WaveformPool::new(2);
        pool.submit(w(1));
        pool.submit(w(2));

        let released = pool.retire_sent(w(2));
        assert_eq!(released, vec![w(1)]);
        assert_eq!(pool.pending_len(), 0);
        assert_eq!(pool.in_flight(), Some(w(2)));
        assert_eq!(pool.current_handle(), None);
    }

    #[test]
    fn previous_in_flight_is_released_on_next_send() {
        let mut pool = WaveformPool::new(2);

        pool.submit(w(1));
        assert!(pool.retire_sent(w(1)).is_empty());

        pool.submit(w(2));
        assert_eq!(pool.live(), 2);
        assert_eq!(pool.retire_sent(w(2)), vec![w(1)]);
        assert_eq!(pool.in_flight(), Some(w(2)));
        assert_eq!(pool.live(), 1);
    }

    #[test]
    fn in_flight_counts_against_capacity() {
        let mut pool = WaveformPool::new(2);
        pool.submit(w(1));
        pool.retire_sent(w(1));

        // in flight + one pending fills the pool; a burst replaces the pending one
        assert!(pool.submit(w(2)).is_empty());
        assert_eq!(pool.submit(w(3)), vec![w(2)]);
        assert_eq!(pool.submit(w(4)), vec![w(3)]);
        assert_eq!(pool.live(), 2);
        assert_eq!(pool.in_flight(), Some(w(1)));
        assert_eq!(pool.current_handle(), Some(w(4)));
    }

    #[test]
    fn in_flight_is_never_evicted() {
        let mut pool = WaveformPool::new(2);
        pool.submit(w(1));
        pool.retire_sent(w(1));
        pool.submit(w(2));

        assert_eq!(pool.make_room(), vec![w(2)]);
        assert!(pool.make_room().is_empty());
        assert_eq!(pool.in_flight(), Some(w(1)));
    }

    #[test]
    fn resending_the_in_flight_handle_releases_nothing() {
        let mut pool = WaveformPool::new(2);
        pool.submit(w(1));
        pool.retire_sent(w(1));
        assert!(pool.retire_sent(w(1)).is_empty());
        assert_eq!(pool.live(), 1);
    }

    #[test]
    fn drain_returns_everything() {
        let mut pool = WaveformPool::new(2);
        pool.submit(w(1));
        pool.retire_sent(w(1));
        pool.submit(w(2));

        let mut all = pool.drain();
        all.sort();
        assert_eq!(all, vec![w(1), w(2)]);
        assert!(pool.is_empty());
        assert!(pool.drain().is_empty());
    }

    #[test]
    fn capacity_is_tunable() {
        assert_eq!(WaveformPool::new(0).capacity(), MIN_CAPACITY);
        assert_eq!(WaveformPool::new(1).capacity(), MIN_CAPACITY);

        let mut pool = WaveformPool::new(3);
        for n in 1..=4 {
            pool.submit(w(n));
        }
        assert_eq!(pool.pending().collect::<Vec<_>>(), vec![w(2), w(3), w(4)]);

        pool.retire_sent(w(4));
        for n in 5..=7 {
            pool.submit(w(n));
        }
        assert_eq!(pool.live(), 3);
        assert_eq!(pool.pending().collect::<Vec<_>>(), vec![w(6), w(7)]);
    }
}
