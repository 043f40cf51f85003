/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Gamepad → PPM channel mapping.
//!
//! The mapping file names, for every PPM channel, where its width comes
//! from.  The expected YAML structure is:
//! ```yaml
//! device: "/dev/input/js0"
//! layout:                 # optional, raw linux/input.h codes per slot
//!   axes: [0, 1, 2, 3, 4, 5, 16, 17]
//!   buttons: [304, 305, 307, 308, 310, 311, 314, 315, 316, 317, 318]
//! channels:
//!   - { source: axis, code: rx }
//!   - { source: axis, code: ry, invert: true }
//!   - { source: button, code: a }
//!   - { source: fixed, width_us: 1500 }
//! ```
//! Without a `layout:` section the xpad layout is assumed.  Without a
//! `channels:` section the default stick mapping below is used.
//!
//! Names are resolved against the layout once, in [`Routes::resolve`]; the
//! per-event path is two vector lookups.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use ppm_tx::channels::{clamp_width, MAX_WIDTH_US, MIN_WIDTH_US};

use crate::joystick::{AxisCode, ButtonCode, DeviceLayout, EventKind, JsEvent, AXIS_FULL_SCALE};

pub const DEFAULT_DEVICE: &str = "/dev/input/js0";

/// Width of a centred axis.
pub const CENTER_WIDTH_US: u32 = (MIN_WIDTH_US + MAX_WIDTH_US) / 2;

const HALF_SPAN_US: i32 = ((MAX_WIDTH_US - MIN_WIDTH_US) / 2) as i32;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("unknown axis code {0:#x} in device layout")]
    UnknownAxisCode(u16),

    #[error("unknown button code {0:#x} in device layout")]
    UnknownButtonCode(u16),

    #[error("channel {channel}: axis {code:?} is not present on the device")]
    AxisNotOnDevice { channel: usize, code: AxisCode },

    #[error("channel {channel}: button {code:?} is not present on the device")]
    ButtonNotOnDevice { channel: usize, code: ButtonCode },

    #[error("mapping defines {given} channels but the frame carries {channels}")]
    TooManyChannels { given: usize, channels: usize },
}

// ── File format ───────────────────────────────────────────────────────────────

/// Where one channel's width comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ChannelSource {
    Axis {
        code: AxisCode,
        #[serde(default)]
        invert: bool,
    },
    Button {
        code: ButtonCode,
    },
    Fixed {
        width_us: u32,
    },
}

/// Raw slot → code tables, as `JSIOCGAXMAP` / `JSIOCGBTNMAP` report them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawLayout {
    pub axes: Vec<u16>,
    pub buttons: Vec<u16>,
}

impl RawLayout {
    pub fn resolve(&self) -> Result<DeviceLayout, MappingError> {
        let axes = self
            .axes
            .iter()
            .map(|&c| AxisCode::from_raw(c).ok_or(MappingError::UnknownAxisCode(c)))
            .collect::<Result<Vec<_>, _>>()?;
        let buttons = self
            .buttons
            .iter()
            .map(|&c| ButtonCode::from_raw(c).ok_or(MappingError::UnknownButtonCode(c)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DeviceLayout { axes, buttons })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub device: PathBuf,
    pub layout: Option<RawLayout>,
    pub channels: Vec<ChannelSource>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            layout: None,
            channels: default_channels(),
        }
    }
}

/// Right stick on roll/pitch, left stick on throttle/yaw, then A, B and the
/// two triggers.
fn default_channels() -> Vec<ChannelSource> {
    use ChannelSource::*;
    vec![
        Axis {
            code: AxisCode::Rx,
            invert: false,
        },
        Axis {
            code: AxisCode::Ry,
            invert: true,
        },
        Axis {
            code: AxisCode::Y,
            invert: true,
        },
        Axis {
            code: AxisCode::X,
            invert: false,
        },
        Button {
            code: ButtonCode::A,
        },
        Button {
            code: ButtonCode::B,
        },
        Axis {
            code: AxisCode::Z,
            invert: false,
        },
        Axis {
            code: AxisCode::Rz,
            invert: false,
        },
    ]
}

impl MappingConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading mapping from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open mapping file: {}", path.display()))?;

        let mapping: MappingConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        debug!(?mapping, "mapping loaded");
        Ok(mapping)
    }

    pub fn device_layout(&self) -> Result<DeviceLayout, MappingError> {
        match &self.layout {
            Some(raw) => raw.resolve(),
            None => Ok(DeviceLayout::xpad()),
        }
    }
}

// ── Value conversion ──────────────────────────────────────────────────────────

/// Linear axis → width: −32767 → 1000 µs, 0 → 1500 µs, 32767 → 2000 µs.
pub fn axis_width(value: i16, invert: bool) -> u32 {
    let mut v = i32::from(value).clamp(-AXIS_FULL_SCALE, AXIS_FULL_SCALE);
    if invert {
        v = -v;
    }
    let width = CENTER_WIDTH_US as i32 + v * HALF_SPAN_US / AXIS_FULL_SCALE;
    clamp_width(width.max(0) as u32)
}

pub fn button_width(value: i16) -> u32 {
    if value != 0 {
        MAX_WIDTH_US
    } else {
        MIN_WIDTH_US
    }
}

// ── Routes ────────────────────────────────────────────────────────────────────

/// Per-slot fan-out tables resolved from a mapping and a device layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    /// axis slot → (channel, invert)
    axes: Vec<Vec<(usize, bool)>>,
    /// button slot → channel
    buttons: Vec<Vec<usize>>,
    initial: Vec<u32>,
}

impl Routes {
    /// Bind every channel source to a device slot.
    ///
    /// Channels beyond the end of `sources` stay at the minimum width.
    ///
    /// # Errors
    /// Fails if `sources` names more channels than the frame carries, or if
    /// a source refers to an axis or button the device does not have.
    pub fn resolve(
        layout: &DeviceLayout,
        sources: &[ChannelSource],
        channels: usize,
    ) -> Result<Self, MappingError> {
        if sources.len() > channels {
            return Err(MappingError::TooManyChannels {
                given: sources.len(),
                channels,
            });
        }
        if sources.len() < channels {
            warn!(
                mapped = sources.len(),
                channels, "unmapped channels stay at minimum width"
            );
        }

        let mut axes = vec![Vec::new(); layout.axes.len()];
        let mut buttons = vec![Vec::new(); layout.buttons.len()];
        let mut initial = vec![MIN_WIDTH_US; channels];

        for (channel, source) in sources.iter().enumerate() {
            match *source {
                ChannelSource::Axis { code, invert } => {
                    let slot = layout
                        .axis_slot(code)
                        .ok_or(MappingError::AxisNotOnDevice { channel, code })?;
                    axes[slot].push((channel, invert));
                    initial[channel] = axis_width(0, invert);
                }
                ChannelSource::Button { code } => {
                    let slot = layout
                        .button_slot(code)
                        .ok_or(MappingError::ButtonNotOnDevice { channel, code })?;
                    buttons[slot].push(channel);
                }
                ChannelSource::Fixed { width_us } => {
                    initial[channel] = clamp_width(width_us);
                }
            }
            debug!(channel, ?source, "channel routed");
        }

        Ok(Self {
            axes,
            buttons,
            initial,
        })
    }

    /// Widths to load before the first event arrives.
    pub fn initial_widths(&self) -> &[u32] {
        &self.initial
    }

    /// Channel updates produced by one event.  Events on unmapped slots
    /// produce nothing.
    pub fn apply(&self, event: &JsEvent) -> Vec<(usize, u32)> {
        let slot = usize::from(event.number);
        match event.kind {
            EventKind::Axis => self
                .axes
                .get(slot)
                .map(|targets| {
                    targets
                        .iter()
                        .map(|&(ch, invert)| (ch, axis_width(event.value, invert)))
                        .collect()
                })
                .unwrap_or_default(),
            EventKind::Button => self
                .buttons
                .get(slot)
                .map(|targets| {
                    let width = button_width(event.value);
                    targets.iter().map(|&ch| (ch, width)).collect()
                })
                .unwrap_or_default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
