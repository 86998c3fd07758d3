//! # ELRS Link
//!
//! Host-side simulator for an ExpressLRS-style radio link.
//!
//! Runs a transmitter and receiver against a modelled radio path while the
//! receiver flies out along a distance ramp, exercising the OTA channel
//! codec, MSP forwarding and dynamic power control in real time.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (path from the first argument, else defaults)
//!    - Set up logging to the console, plus a daily log file if configured
//!
//! 2. **Main Loop**
//!    - One uplink packet per air-rate interval
//!    - Telemetry slot every `telemetry_ratio` packets
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Shutdown**
//!    - Flush telemetry logs and report link counters
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! RUST_LOG=elrs_link=debug cargo run
//! ```

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use elrs_link::config::{Config, LoggingConfig};
use elrs_link::sim::run_configured;

/// Used when no configuration path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _guard = init_logging(&config.logging);

    info!("ELRS Link v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Press Ctrl+C to exit");

    let summary = run_configured(config).await?;
    info!("Final power {}", summary.final_power);

    Ok(())
}

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load config from {}", path)),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).context("Failed to load default config")
        }
        None => Ok(Config::default()),
    }
}

/// Console logging, plus a daily rolling file when `logging.dir` is set
///
/// The returned guard must live until exit so buffered lines reach the file.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}
