/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::time::Instant;
use tracing::{error, info, warn};

use ppm_tx::channels::{MAX_WIDTH_US, MIN_WIDTH_US};
use ppm_tx::config::Settings;
use ppm_tx::executor::pigpio::PigpioExecutor;
use ppm_tx::executor::sim::SimExecutor;
use ppm_tx::executor::WaveExecutor;
use ppm_tx::PpmEngine;

/// Delay between two sweep updates.
const SWEEP_STEP: Duration = Duration::from_millis(30);

/// Width increment of the sweep.
const SWEEP_INCREMENT_US: usize = 5;

/// How long the final sweep pattern is held before stopping.
const SWEEP_HOLD: Duration = Duration::from_secs(2);

// ── CLI argument definition ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// pigpio daemon over TCP (Raspberry Pi).
    Pigpio,
    /// In-memory simulator (dry run, no hardware).
    Sim,
}

/// PPM transmitter (Rust implementation).
///
/// Example:
///   ppm-tx --gpio 6 --channels 8 --frame-ms 20 --sweep
///   ppm-tx -c configs/ppm.yaml --backend sim
#[derive(Debug, Parser)]
#[command(
    name = "ppm-tx",
    about = "Glitch-free PPM transmitter driven through pigpio",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML settings file.  Flags below override its values.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Output GPIO (Broadcom numbering).
    #[arg(short = 'g', long = "gpio")]
    gpio: Option<u32>,

    /// Number of PPM channels.
    #[arg(short = 'n', long = "channels")]
    channels: Option<usize>,

    /// Frame period in milliseconds.
    #[arg(short = 'f', long = "frame-ms")]
    frame_ms: Option<u32>,

    /// Low gap before every channel pulse, in microseconds.
    #[arg(long = "gap-us")]
    gap_us: Option<u32>,

    /// Maximum number of waveforms held at once, the transmitting one included.
    #[arg(long = "max-live-waves")]
    max_live_waves: Option<usize>,

    /// Execution engine backend.
    #[arg(short = 'b', long = "backend", value_enum, default_value_t = Backend::Pigpio)]
    backend: Backend,

    /// pigpio daemon host.
    #[arg(long = "host")]
    host: Option<String>,

    /// pigpio daemon port.
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Run the channel sweep demo instead of holding the frame.
    #[arg(short = 's', long = "sweep", default_value_t = false)]
    sweep: bool,
}

impl Cli {
    /// Merge the settings file (if any) with command-line overrides.
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from_file(path)?,
            None => {
                warn!("No settings file provided, using defaults");
                Settings::default()
            }
        };

        if let Some(v) = self.gpio {
            settings.ppm.gpio = v;
        }
        if let Some(v) = self.channels {
            settings.ppm.channels = v;
        }
        if let Some(v) = self.frame_ms {
            settings.ppm.frame_ms = v;
        }
        if let Some(v) = self.gap_us {
            settings.ppm.gap_us = v;
        }
        if let Some(v) = self.max_live_waves {
            settings.ppm.max_live_waves = v;
        }
        if let Some(v) = &self.host {
            settings.pigpio.host = v.clone();
        }
        if let Some(v) = self.port {
            settings.pigpio.port = v;
        }
        Ok(settings)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        error!("ppm-tx failed: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = cli.settings()?;
    let frame = settings.frame_config();

    info!(
        backend = ?cli.backend,
        gpio = frame.gpio(),
        channels = frame.channels(),
        frame_us = frame.frame_us(),
        gap_us = frame.gap_us(),
        sweep = cli.sweep,
        "Configuration"
    );

    match cli.backend {
        Backend::Pigpio => {
            let executor = PigpioExecutor::connect(&settings.pigpio.host, settings.pigpio.port)
                .with_context(|| {
                    format!(
                        "Cannot connect to pigpio daemon at {}:{}",
                        settings.pigpio.host, settings.pigpio.port
                    )
                })?;
            drive(PpmEngine::new(frame, executor)?, cli.sweep).await
        }
        Backend::Sim => drive(PpmEngine::new(frame, SimExecutor::new())?, cli.sweep).await,
    }
}

/// Start the engine, run the selected mode until it ends or ctrl-c arrives,
/// then stop the engine.
async fn drive<E: WaveExecutor>(engine: PpmEngine<E>, sweep: bool) -> Result<()> {
    if let Err(e) = engine.start().await {
        engine.stop().await;
        return Err(e).context("Failed to start PPM engine");
    }

    let outcome = if sweep {
        tokio::select! {
            r = run_sweep(&engine) => r,
            r = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                r.context("Failed to listen for ctrl-c")
            }
        }
    } else {
        info!("Transmitting, press ctrl-c to stop");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for ctrl-c")
    };

    engine.stop().await;
    info!(sends = engine.sends(), "PPM engine stopped");
    outcome
}

/// Sweep every channel across the full width range, then hold an
/// alternating min/max pattern.
async fn run_sweep<E: WaveExecutor>(engine: &PpmEngine<E>) -> Result<()> {
    let started = Instant::now();
    let mut updates = 0u64;
    let mut tick = tokio::time::interval(SWEEP_STEP);

    for channel in 0..engine.channel_count() {
        for width in (MIN_WIDTH_US..MAX_WIDTH_US).step_by(SWEEP_INCREMENT_US) {
            tick.tick().await;
            if engine.update_channel(channel, width).is_ok() {
                updates += 1;
            }
        }
    }

    let secs = started.elapsed().as_secs_f64();
    info!(
        updates,
        seconds = secs,
        per_second = (updates as f64 / secs) as u64,
        "Sweep finished"
    );

    let pattern: Vec<u32> = (0..engine.channel_count())
        .map(|i| if i % 2 == 0 { MIN_WIDTH_US } else { MAX_WIDTH_US })
        .collect();
    engine.update_channels(&pattern)?;
    tokio::time::sleep(SWEEP_HOLD).await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
