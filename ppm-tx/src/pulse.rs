/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pulse-train construction for one PPM frame.
//!
//! A frame is laid out as one `(gap, pulse)` pair per channel followed by a
//! single low segment that pads the frame out to its period:
//!
//! ```text
//!  gap  ch0   gap  ch1         gap  chN-1        tail
//! ____|‾‾‾‾‾|____|‾‾‾‾‾‾‾| ... ____|‾‾‾‾|___________________
//!  └──────────────── frame period (e.g. 20 000 µs) ──────────┘
//! ```
//!
//! [`build`] is a pure function: the same widths always give the same train,
//! and the durations of a successfully built train sum to the frame period.

use thiserror::Error;

// ── Segment types ─────────────────────────────────────────────────────────────

/// Logical output level of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// One constant-level stretch of the output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub level: Level,
    pub duration_us: u32,
}

impl Segment {
    pub fn low(duration_us: u32) -> Self {
        Self {
            level: Level::Low,
            duration_us,
        }
    }

    pub fn high(duration_us: u32) -> Self {
        Self {
            level: Level::High,
            duration_us,
        }
    }
}

/// Immutable, ordered segment sequence describing exactly one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseTrain {
    segments: Vec<Segment>,
    frame_us: u32,
}

impl PulseTrain {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment durations in order, for logging and assertions.
    pub fn durations(&self) -> Vec<u32> {
        self.segments.iter().map(|s| s.duration_us).collect()
    }

    /// Sum of all segment durations.  Equals [`frame_us`](Self::frame_us) for
    /// every train produced by [`build`].
    pub fn total_us(&self) -> u64 {
        self.segments.iter().map(|s| u64::from(s.duration_us)).sum()
    }

    pub fn frame_us(&self) -> u32 {
        self.frame_us
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PulseError {
    /// Pulses and gaps together need more time than one frame provides.
    #[error("channel pulses need {used_us}µs but the frame period is only {frame_us}µs")]
    FrameOverflow { used_us: u64, frame_us: u32 },
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Build the pulse train for one frame.
///
/// `widths` are expected to be clamped already (see
/// [`ChannelStore`](crate::channels::ChannelStore)); this function does not
/// re-validate them.
///
/// # Errors
/// [`PulseError::FrameOverflow`] if `Σ(width + gap) > frame_us`.
pub fn build(widths: &[u32], gap_us: u32, frame_us: u32) -> Result<PulseTrain, PulseError> {
    let mut segments = Vec::with_capacity(widths.len() * 2 + 1);
    let mut used_us: u64 = 0;

    for &width in widths {
        segments.push(Segment::low(gap_us));
        segments.push(Segment::high(width));
        used_us += u64::from(width) + u64::from(gap_us);
    }

    if used_us > u64::from(frame_us) {
        return Err(PulseError::FrameOverflow { used_us, frame_us });
    }

    // used_us <= frame_us, so the difference fits in u32
    segments.push(Segment::low(frame_us - used_us as u32));

    Ok(PulseTrain { segments, frame_us })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
