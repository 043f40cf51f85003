/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the PPM engine.
//!
//! Two enums model the two failure layers:
//!
//! * [`UpdateError`]: a single channel update could not be applied.  These
//!   are soft failures: the engine logs them, leaves its state unchanged
//!   (except where noted) and keeps transmitting the previous frame.
//! * [`EngineError`]: construction and lifecycle failures.
//!
//! Transmit failures inside the scheduler loop never surface here; they are
//! logged and retried at the next frame boundary.

use thiserror::Error;

use crate::executor::ExecutorError;
use crate::pulse::PulseError;
use crate::scheduler::SchedulerState;

/// Why a call to `update_channel` / `update_channels` was not applied.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The channel index does not exist.  Nothing was stored.
    #[error("channel {index} does not exist (engine has {channels} channels)")]
    ChannelOutOfRange { index: usize, channels: usize },

    /// A full-vector update had the wrong length.  Nothing was stored.
    #[error("got {given} channel widths, expected exactly {expected}")]
    ChannelCount { given: usize, expected: usize },

    /// The engine has been stopped and its waveforms released.
    #[error("engine is stopped, update ignored")]
    Stopped,

    /// The stored widths no longer fit the frame.  Unreachable with a
    /// clamped [`FrameConfig`](crate::config::FrameConfig).
    #[error(transparent)]
    Build(#[from] PulseError),

    /// The widths were stored but the execution engine could not create the
    /// new waveform; the next successful update picks them up.
    #[error("waveform not created: {0}")]
    Engine(#[from] ExecutorError),
}

/// Construction and lifecycle failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configured channels cannot fit the frame period.
    #[error("frame configuration does not fit: {0}")]
    FrameOverflow(#[from] PulseError),

    /// The execution engine failed during construction or start-up.
    #[error("execution engine: {0}")]
    Executor(#[from] ExecutorError),

    /// `start()` was called outside the `Idle` state.
    #[error("cannot {action} the engine while it is {state:?}")]
    Lifecycle {
        action: &'static str,
        state: SchedulerState,
    },
}
