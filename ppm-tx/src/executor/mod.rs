/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Seam to the pulse-train execution engine.
//!
//! The engine that turns a [`PulseTrain`] into DMA-timed GPIO edges lives
//! outside this crate.  Everything the PPM core needs from it is captured by
//! [`WaveExecutor`]:
//!
//! ```text
//! PpmEngine ──create_waveform──►  executor  ──► WaveId
//! scheduler ──transmit(id, Repeat)──► executor keeps looping the frame
//! stop()    ──halt / release_waveform──► executor frees its resources
//! ```
//!
//! Two implementations ship with the crate:
//! * [`pigpio::PigpioExecutor`]: pigpio daemon socket client (Raspberry Pi).
//! * [`sim::SimExecutor`]: in-memory recorder for tests and dry runs.

pub mod pigpio;
pub mod sim;

use std::fmt;

use thiserror::Error;

use crate::pulse::{Level, PulseTrain};

// ── Handles and modes ─────────────────────────────────────────────────────────

/// Opaque waveform handle issued by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaveId(pub u32);

impl fmt::Display for WaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wave#{}", self.0)
    }
}

/// How the execution engine should play a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitMode {
    /// Play the frame once.
    Once,
    /// Loop the frame until told otherwise.  A waveform already playing
    /// finishes its current cycle before the new one takes over.
    Repeat,
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures reported by the execution engine.
///
/// All of them are treated as transient by the scheduler: the cycle is
/// skipped and retried at the next frame boundary.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The engine cannot accept the request right now.
    #[error("execution engine busy")]
    Busy,

    /// The engine ran out of waveform storage (ids, control blocks, pulses).
    #[error("execution engine resources exhausted (code {code})")]
    ResourceExhausted { code: i32 },

    /// The engine rejected a command with an error code.
    #[error("execution engine rejected {command} (code {code})")]
    Rejected { command: &'static str, code: i32 },

    /// The referenced waveform is not known to the engine.
    #[error("unknown waveform {0}")]
    UnknownWave(WaveId),

    #[error("execution engine I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("execution engine protocol: {0}")]
    Protocol(String),
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Operations the PPM core consumes from the execution engine.
///
/// Calls are synchronous and expected to be short (a local socket round trip
/// at most).  The engine is always accessed under the core's lock, so
/// implementations need `Send` but not `Sync`.
pub trait WaveExecutor: Send + 'static {
    /// Materialise `train` on `gpio` and return its handle.
    fn create_waveform(&mut self, train: &PulseTrain, gpio: u32)
        -> Result<WaveId, ExecutorError>;

    /// Start transmitting `id`.
    fn transmit(&mut self, id: WaveId, mode: TransmitMode) -> Result<(), ExecutorError>;

    /// `true` while any waveform is being played.
    fn is_transmitting(&mut self) -> Result<bool, ExecutorError>;

    /// Free the resources held by `id`.
    fn release_waveform(&mut self, id: WaveId) -> Result<(), ExecutorError>;

    /// Stop whatever is being transmitted.
    fn halt(&mut self) -> Result<(), ExecutorError>;

    /// Drive `gpio` to a fixed level (used to park the line when idle).
    fn set_output_level(&mut self, gpio: u32, level: Level) -> Result<(), ExecutorError>;
}
