/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Drift-free wake-time computation.
//!
//! [`Cadence`] owns the schedule anchor and answers one question per cycle:
//! *when should the scheduler wake next?*  It never reads a clock; the caller
//! passes `now`, which keeps the arithmetic testable without real time.
//!
//! # Rules
//! * **After a send** the anchor advances by exactly one period from the
//!   previous anchor, as long as `now` is within half a period of that
//!   nominal boundary.  Wake-up latency therefore does not accumulate: a late
//!   cycle shortens the next wait instead of shifting every later frame.
//!   If the loop is more than half a period off (first send, long stall) the
//!   anchor snaps to `now` rather than bursting to catch up.
//! * **When idle** (nothing to send, or the send failed) the next boundary is
//!   kept if it is still at least half a period away; otherwise the anchor
//!   resets to `now` and the scheduler waits a full period.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Cadence {
    period: Duration,
    anchor: Option<Instant>,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            anchor: None,
        }
    }

    /// Nominal time of the last send (or idle re-anchor).
    pub fn anchor(&self) -> Option<Instant> {
        self.anchor
    }

    /// A frame was handed to the engine at `now`.  Returns the next wake time.
    pub fn on_send(&mut self, now: Instant) -> Instant {
        let anchor = match self.anchor {
            Some(prev) => {
                let nominal = prev + self.period;
                if distance(now, nominal) <= self.period / 2 {
                    nominal
                } else {
                    now
                }
            }
            None => now,
        };
        self.anchor = Some(anchor);
        anchor + self.period
    }

    /// Nothing was sent at `now`.  Returns the next wake time.
    pub fn on_idle(&mut self, now: Instant) -> Instant {
        if let Some(anchor) = self.anchor {
            let boundary = anchor + self.period;
            if boundary.saturating_duration_since(now) >= self.period / 2 {
                return boundary;
            }
        }
        self.anchor = Some(now);
        now + self.period
    }
}

fn distance(a: Instant, b: Instant) -> Duration {
    a.saturating_duration_since(b)
        .max(b.saturating_duration_since(a))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
