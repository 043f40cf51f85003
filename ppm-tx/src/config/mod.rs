//! Frame configuration and the optional YAML settings file.
//!
//! [`FrameConfig`] is the validated, clamped description of the frame the
//! engine transmits.  It is built once and never changes afterwards.
//!
//! [`Settings`] is the on-disk form.  The expected YAML structure is:
//! ```yaml
//! ppm:
//!   gpio: 6
//!   channels: 8
//!   frame_ms: 20
//!   gap_us: 100
//!   max_live_waves: 2
//! pigpio:
//!   host: "localhost"
//!   port: 8888
//! ```
//! Every field is optional; missing values fall back to the defaults above.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::channels::MAX_WIDTH_US;

// ── Limits and defaults ───────────────────────────────────────────────────────

/// Shortest accepted frame period.
pub const MIN_FRAME_MS: u32 = 5;

/// Longest accepted frame period.
pub const MAX_FRAME_MS: u32 = 100;

/// Channel count forced when the requested frame is shorter than
/// [`MIN_FRAME_MS`].
const SHORT_FRAME_CHANNELS: usize = 2;

/// Accepted inter-pulse gap range (µs).
pub const MIN_GAP_US: u32 = 1;
pub const MAX_GAP_US: u32 = 1_000;

/// Waveforms the engine may own at once: one transmitting, one waiting.
pub const MIN_LIVE_WAVES: usize = 2;

pub const DEFAULT_GPIO: u32 = 6;
pub const DEFAULT_CHANNELS: usize = 8;
pub const DEFAULT_FRAME_MS: u32 = 20;
pub const DEFAULT_GAP_US: u32 = 100;
pub const DEFAULT_MAX_LIVE_WAVES: usize = 2;
pub const DEFAULT_PIGPIO_HOST: &str = "localhost";
pub const DEFAULT_PIGPIO_PORT: u16 = 8888;

// ── FrameConfig ───────────────────────────────────────────────────────────────

/// Clamped frame configuration.
///
/// Invariant: `channels × (MAX_WIDTH_US + gap_us) <= frame_us`, so a frame
/// built from any clamped width vector always fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    gpio: u32,
    channels: usize,
    frame_us: u32,
    gap_us: u32,
    max_live_waves: usize,
}

impl FrameConfig {
    /// Validate and clamp a frame description.
    ///
    /// * `frame_ms` is clamped to `[MIN_FRAME_MS, MAX_FRAME_MS]`; a frame that
    ///   is too short also forces the channel count down to 2.
    /// * `gap_us` is clamped to `[MIN_GAP_US, MAX_GAP_US]`.
    /// * `channels` is clamped to `1..=frame_ms / 2` and further capped so that
    ///   every channel at full width still fits in the frame.
    ///
    /// Adjustments are logged at `warn!`; nothing here fails.
    pub fn new(gpio: u32, channels: usize, frame_ms: u32, gap_us: u32) -> Self {
        let mut channels = channels;
        let frame_ms = if frame_ms < MIN_FRAME_MS {
            warn!(requested = frame_ms, used = MIN_FRAME_MS, "frame period too short");
            channels = SHORT_FRAME_CHANNELS;
            MIN_FRAME_MS
        } else if frame_ms > MAX_FRAME_MS {
            warn!(requested = frame_ms, used = MAX_FRAME_MS, "frame period too long");
            MAX_FRAME_MS
        } else {
            frame_ms
        };
        let frame_us = frame_ms * 1_000;

        let clamped_gap = gap_us.clamp(MIN_GAP_US, MAX_GAP_US);
        if clamped_gap != gap_us {
            warn!(requested = gap_us, used = clamped_gap, "inter-pulse gap out of range");
        }

        let fit = (frame_us / (MAX_WIDTH_US + clamped_gap)) as usize;
        let max_channels = (frame_ms as usize / 2).min(fit).max(1);
        let clamped_channels = channels.clamp(1, max_channels);
        if clamped_channels != channels {
            warn!(
                requested = channels,
                used = clamped_channels,
                frame_us,
                "channel count does not fit the frame"
            );
        }

        let cfg = Self {
            gpio,
            channels: clamped_channels,
            frame_us,
            gap_us: clamped_gap,
            max_live_waves: DEFAULT_MAX_LIVE_WAVES,
        };
        debug!(?cfg, "frame configuration");
        cfg
    }

    /// Set how many waveforms the engine may own at once, the one being
    /// transmitted included (at least [`MIN_LIVE_WAVES`]).
    pub fn with_max_live_waves(mut self, max_live: usize) -> Self {
        if max_live < MIN_LIVE_WAVES {
            warn!(
                requested = max_live,
                used = MIN_LIVE_WAVES,
                "max_live_waves below minimum"
            );
        }
        self.max_live_waves = max_live.max(MIN_LIVE_WAVES);
        self
    }

    pub fn gpio(&self) -> u32 {
        self.gpio
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frame_us(&self) -> u32 {
        self.frame_us
    }

    pub fn gap_us(&self) -> u32 {
        self.gap_us
    }

    pub fn max_live_waves(&self) -> usize {
        self.max_live_waves
    }

    pub fn frame_period(&self) -> std::time::Duration {
        std::time::Duration::from_micros(u64::from(self.frame_us))
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_GPIO,
            DEFAULT_CHANNELS,
            DEFAULT_FRAME_MS,
            DEFAULT_GAP_US,
        )
    }
}

// ── Settings file ─────────────────────────────────────────────────────────────

/// `ppm:` section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PpmSettings {
    pub gpio: u32,
    pub channels: usize,
    pub frame_ms: u32,
    pub gap_us: u32,
    pub max_live_waves: usize,
}

impl Default for PpmSettings {
    fn default() -> Self {
        Self {
            gpio: DEFAULT_GPIO,
            channels: DEFAULT_CHANNELS,
            frame_ms: DEFAULT_FRAME_MS,
            gap_us: DEFAULT_GAP_US,
            max_live_waves: DEFAULT_MAX_LIVE_WAVES,
        }
    }
}

/// `pigpio:` section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PigpioSettings {
    pub host: String,
    pub port: u16,
}

impl Default for PigpioSettings {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_PIGPIO_HOST),
            port: DEFAULT_PIGPIO_PORT,
        }
    }
}

/// Complete settings as read from YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ppm: PpmSettings,
    pub pigpio: PigpioSettings,
}

impl Settings {
    /// Parse `path` into [`Settings`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading settings from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open settings file: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    /// Clamp the `ppm:` section into a [`FrameConfig`].
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig::new(
            self.ppm.gpio,
            self.ppm.channels,
            self.ppm.frame_ms,
            self.ppm.gap_us,
        )
        .with_max_live_waves(self.ppm.max_live_waves)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
