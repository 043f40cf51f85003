/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! ppm-tx – glitch-free PPM frame transmitter
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/         – frame clamping + YAML settings
//! ├── channels        – channel width store (clamping)
//! ├── pulse           – widths → pulse train
//! ├── pool            – waveform handle bookkeeping
//! ├── executor/       – execution engine seam (pigpio daemon, simulator)
//! ├── scheduler/      – periodic transmit loop + drift-free cadence
//! └── engine/         – update API and lifecycle controller
//! ```

pub mod channels;
pub mod config;
pub mod engine;
pub mod executor;
pub mod pool;
pub mod pulse;
pub mod scheduler;

pub use config::FrameConfig;
pub use engine::{EngineError, PpmEngine, UpdateError};
