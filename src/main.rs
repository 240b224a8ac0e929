//! # Wattmeter Monitor
//!
//! Stream live voltage/current samples from an ESP32 wattmeter.
//!
//! Connects to the device's WebSocket endpoint, keeps a rolling window of the
//! most recent samples and periodically logs a summary of it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wattmeter_monitor::config::{Config, LoggingConfig};
use wattmeter_monitor::connection::{ConnectionEvent, TelemetryConnection};
use wattmeter_monitor::samples::SampleWindow;
use wattmeter_monitor::telemetry::SampleRecorder;
use wattmeter_monitor::transport::websocket::WebSocketTransport;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for the wattmeter monitor
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging to stdout and optionally a daily log file
///    - Open the telemetry connection
///
/// 2. **Main Loop**
///    - Log connection changes and errors
///    - Record each frame's samples when recording is enabled
///    - Log a window summary every `status_interval_frames` frames
///    - Give up if the device does not connect within `connect_timeout_ms`
///
/// 3. **Graceful Shutdown**
///    - Close the connection on Ctrl+C or when the device disconnects
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO wattmeter_monitor: Wattmeter Monitor v0.1.0 starting...
/// INFO wattmeter_monitor: Connected to ws://192.168.1.46:8080/ws
/// INFO wattmeter_monitor: Window: 1024 samples (frames=100, V=[228.41, 231.02], A=[0.412, 0.530], P=108.6W)
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_path) = load_config(std::env::args().nth(1))?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Wattmeter Monitor v{} starting...", env!("CARGO_PKG_VERSION"));
    match config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let target = config.target()?;
    let mut recorder = if config.recording.enabled {
        Some(SampleRecorder::from_config(&config.recording)?)
    } else {
        None
    };

    let transport = WebSocketTransport::new();
    let mut connection = TelemetryConnection::from_config(&config);
    let mut events = connection.open(&transport, target.clone())?;
    info!("Press Ctrl+C to exit");

    let connect_timeout = sleep(Duration::from_millis(config.connection.connect_timeout_ms));
    tokio::pin!(connect_timeout);

    let mut connected = false;
    let mut timed_out = false;
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ConnectionEvent::ConnectionChanged(true)) => {
                    connected = true;
                    info!("Connected to {}", target);
                }
                Some(ConnectionEvent::ConnectionChanged(false)) => {
                    info!("Disconnected from {}", target);
                    break;
                }
                Some(ConnectionEvent::Samples(window)) => {
                    frames += 1;

                    if let Some(recorder) = recorder.as_mut() {
                        if let Err(e) = recorder.record(window.latest()) {
                            warn!("Failed to record samples: {}", e);
                        }
                    }

                    if frames % config.logging.status_interval_frames == 0 {
                        info!("{}", window_summary(&window, frames));
                    }
                }
                Some(ConnectionEvent::Error(e)) if e.is_recoverable() => {
                    warn!("{}", e);
                }
                Some(ConnectionEvent::Error(e)) => {
                    error!("{}", e);
                }
                None => {
                    debug!("Event channel closed");
                    break;
                }
            },

            _ = &mut connect_timeout, if !connected => {
                warn!(
                    "No connection to {} after {}ms",
                    target, config.connection.connect_timeout_ms
                );
                timed_out = true;
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    connection.close().await?;
    info!("Total frames received: {}", frames);

    if timed_out {
        bail!("Timed out connecting to {}", target);
    }
    Ok(())
}

/// Load the configuration file named on the command line
///
/// Without an argument the default path is tried, and built-in defaults are
/// used if that file does not exist. An explicitly named file must exist.
fn load_config(arg: Option<String>) -> Result<(Config, Option<PathBuf>)> {
    let (path, explicit) = match arg {
        Some(arg) => (PathBuf::from(arg), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    if !explicit && !path.exists() {
        return Ok((Config::default(), None));
    }

    let config = Config::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok((config, Some(path)))
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// log file and must be held until exit.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = if config.file.is_empty() {
        (None, None)
    } else {
        let path = Path::new(&config.file);
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let Some(name) = path.file_name() else {
            bail!("Invalid log file path: {}", config.file);
        };

        let appender = tracing_appender::rolling::daily(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// One-line summary of a sample window
fn window_summary(window: &SampleWindow, frames: u64) -> String {
    match window.stats() {
        Some(stats) => format!(
            "Window: {} samples (frames={}, V=[{:.2}, {:.2}], A=[{:.3}, {:.3}], P={:.1}W)",
            window.len(),
            frames,
            stats.voltage_min,
            stats.voltage_max,
            stats.current_min,
            stats.current_max,
            stats.mean_power
        ),
        None => format!("Window: empty (frames={})", frames),
    }
}
