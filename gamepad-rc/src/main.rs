/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Gamepad → PPM bridge.
//!
//! Reads Linux joystick events, routes them through the channel mapping and
//! feeds the resulting widths into a [`PpmEngine`].

mod joystick;
mod mapping;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, trace, warn};

use ppm_tx::config::Settings;
use ppm_tx::executor::pigpio::PigpioExecutor;
use ppm_tx::executor::sim::SimExecutor;
use ppm_tx::executor::WaveExecutor;
use ppm_tx::PpmEngine;

use crate::joystick::{JsEvent, EVENT_LEN};
use crate::mapping::{MappingConfig, Routes};

const INPUT_DIR: &str = "/dev/input";

// ── CLI argument definition ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// pigpio daemon over TCP (Raspberry Pi).
    Pigpio,
    /// In-memory simulator (dry run, no hardware).
    Sim,
}

/// Gamepad to PPM bridge.
///
/// Example:
///   gamepad-rc -c configs/ppm.yaml -m configs/gamepad.yaml
///   gamepad-rc --device /dev/input/js1 --backend sim
#[derive(Debug, Parser)]
#[command(
    name = "gamepad-rc",
    about = "Drive a PPM transmitter from a Linux joystick device",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML PPM settings file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Path to the YAML channel mapping file.
    #[arg(short = 'm', long = "mapping")]
    mapping: Option<PathBuf>,

    /// Joystick device, overrides the mapping file.
    #[arg(short = 'd', long = "device")]
    device: Option<PathBuf>,

    /// Execution engine backend.
    #[arg(short = 'b', long = "backend", value_enum, default_value_t = Backend::Pigpio)]
    backend: Backend,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        error!("gamepad-rc failed: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_file(path)?,
        None => {
            warn!("No settings file provided, using defaults");
            Settings::default()
        }
    };
    let mut mapping = match &cli.mapping {
        Some(path) => MappingConfig::load_from_file(path)?,
        None => {
            info!("No mapping file provided, using the default stick layout");
            MappingConfig::default()
        }
    };
    if let Some(device) = &cli.device {
        mapping.device = device.clone();
    }

    let frame = settings.frame_config();
    let layout = mapping.device_layout()?;
    let routes = Routes::resolve(&layout, &mapping.channels, frame.channels())?;

    match count_joysticks(Path::new(INPUT_DIR)) {
        Ok(0) => warn!("No joystick devices found in {}", INPUT_DIR),
        Ok(n) => info!(joysticks = n, "Joystick devices found"),
        Err(e) => debug!(error = %e, "Cannot list {}", INPUT_DIR),
    }

    let device = tokio::fs::File::open(&mapping.device)
        .await
        .with_context(|| format!("Cannot open joystick: {}", mapping.device.display()))?;
    info!(
        device = %mapping.device.display(),
        backend = ?cli.backend,
        channels = frame.channels(),
        "Joystick opened"
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
            bridge(PpmEngine::new(frame, executor)?, &routes, device).await
        }
        Backend::Sim => bridge(PpmEngine::new(frame, SimExecutor::new())?, &routes, device).await,
    }
}

/// Count `js*` nodes in `dir`.
fn count_joysticks(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        if entry?.file_name().to_string_lossy().starts_with("js") {
            count += 1;
        }
    }
    Ok(count)
}

/// Load the initial widths, start the engine and pump events until the
/// device closes or ctrl-c arrives.
async fn bridge<E, R>(engine: PpmEngine<E>, routes: &Routes, mut device: R) -> Result<()>
where
    E: WaveExecutor,
    R: AsyncRead + Unpin,
{
    if let Err(e) = start_engine(&engine, routes).await {
        engine.stop().await;
        return Err(e);
    }

    let outcome = tokio::select! {
        r = pump_events(&engine, routes, &mut device) => r.map(|_| ()),
        r = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping");
            r.context("Failed to listen for ctrl-c")
        }
    };

    engine.stop().await;
    info!(sends = engine.sends(), "PPM engine stopped");
    outcome
}

async fn start_engine<E: WaveExecutor>(engine: &PpmEngine<E>, routes: &Routes) -> Result<()> {
    engine
        .update_channels(routes.initial_widths())
        .context("Failed to load initial channel widths")?;
    engine.start().await.context("Failed to start PPM engine")?;
    Ok(())
}

/// Read events until end of stream.  Returns the number of channel updates
/// the engine accepted.
async fn pump_events<E, R>(engine: &PpmEngine<E>, routes: &Routes, device: &mut R) -> Result<u64>
where
    E: WaveExecutor,
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; EVENT_LEN];
    let mut applied = 0u64;
    loop {
        match device.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                info!(applied, "Joystick closed");
                return Ok(applied);
            }
            Err(e) => return Err(e).context("Failed to read joystick event"),
        }

        let Some(event) = JsEvent::decode(&buf) else {
            debug!(ty = buf[6], "skipping unhandled event type");
            continue;
        };
        trace!(
            time_ms = event.time_ms,
            kind = ?event.kind,
            number = event.number,
            value = event.value,
            initial = event.initial,
            "joystick event"
        );
        for (channel, width) in routes.apply(&event) {
            // failures are logged by the engine; the previous frame stays on air
            if engine.update_channel(channel, width).is_ok() {
                applied += 1;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
