// src/main.rs - EC fan control daemon
use clap::Parser;
use clevo_fan_rs::config::{self, Config, PolicyKind, TempSource};
use clevo_fan_rs::{ConfigError, EcCommand, FanLoop};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload;

/// Hysteresis fan control for Clevo/System76 laptops driven through an EC helper binary.
#[derive(Parser, Debug)]
#[command(name = "clevo-fanloop", version, about)]
struct Cli {
    /// Path to a TOML config file (flags below override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// EC Controller binary (prints JSON without args, sets duty with one)
    #[arg(long = "ecc-bin")]
    ecc_bin: Option<String>,

    /// Monitoring period in seconds
    #[arg(long = "period-s")]
    period_s: Option<u64>,

    /// Moving-average total window in seconds
    #[arg(long = "mavg-window-s")]
    mavg_window_s: Option<u64>,

    /// App logger level (trace, debug, info, warn, error)
    #[arg(long = "app-loglevel", env = "APP_LOGLEVEL")]
    app_loglevel: Option<String>,

    /// Decide and log, but never write a duty
    #[arg(long)]
    dry_run: bool,

    /// Duty policy
    #[arg(long, value_enum)]
    policy: Option<PolicyKind>,

    /// Temperature fed to the smoother
    #[arg(long = "temp-source", value_enum)]
    temp_source: Option<TempSource>,

    /// Minimum seconds between transitions into or out of 0% duty
    #[arg(long = "zero-holdoff-s")]
    zero_holdoff_s: Option<u64>,

    /// Duty to apply once when stopped by a signal
    #[arg(long = "exit-duty", value_parser = clap::value_parser!(u8).range(0..=100))]
    exit_duty: Option<u8>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(bin) = &self.ecc_bin {
            config.ec.bin = bin.clone();
        }
        if let Some(v) = self.period_s {
            config.control.period_s = v;
        }
        if let Some(v) = self.mavg_window_s {
            config.control.mavg_window_s = v;
        }
        if let Some(level) = &self.app_loglevel {
            config.logging.level = level.clone();
        }
        if self.dry_run {
            config.control.dry_run = true;
        }
        if let Some(v) = self.policy {
            config.control.policy = v;
        }
        if let Some(v) = self.temp_source {
            config.control.temp_source = v;
        }
        if let Some(v) = self.zero_holdoff_s {
            config.control.zero_holdoff_s = v;
        }
        if self.exit_duty.is_some() {
            config.control.exit_duty = self.exit_duty;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Initialize logging before the config file is read; the level from the
    // file is applied once it is known.
    let initial_level = cli
        .app_loglevel
        .as_deref()
        .and_then(|level| level.trim().parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    let (level_filter, level_handle) = reload::Layer::new(LevelFilter::from_level(initial_level));
    tracing_subscriber::registry()
        .with(level_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    if let Ok(level) = config.logging.max_level() {
        if let Err(e) = level_handle.modify(|filter| *filter = LevelFilter::from_level(level)) {
            tracing::warn!("Cannot change log level: {}", e);
        }
    }

    let ec = EcCommand::from_command_line(&config.ec.bin).ok_or(ConfigError::MissingBinary)?;
    tracing::info!("EC helper: {}", config.ec.bin);

    let mut fan_loop = FanLoop::new(ec.clone(), ec, &config.control)?;

    tokio::select! {
        _ = fan_loop.run() => {}
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Err(e) = fan_loop.shutdown(config.control.exit_duty).await {
        tracing::error!("{}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
