//! CLI entry point for the simulation harness: runs the fan loop against a
//! simulated EC on a virtual clock and writes a CSV trace.

use clap::Parser;
use clevo_fan_rs::config::{ControlConfig, PolicyKind};
use clevo_fan_rs::control::{FanError, FanLoop, TickOutcome};
use clevo_fan_rs::sim::{SimulatedEc, ThermalModel};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Simulation Harness CLI
#[derive(Parser, Debug)]
#[command(name = "sim-harness", about = "Run the fan loop against a simulated laptop.")]
pub struct Cli {
    /// Number of ticks to simulate
    #[arg(long, default_value_t = 200)]
    ticks: u32,

    #[arg(long = "period-s", default_value_t = 3)]
    period_s: u64,

    #[arg(long = "mavg-window-s", default_value_t = 15)]
    mavg_window_s: u64,

    #[arg(long, value_enum, default_value_t = PolicyKind::Hysteresis)]
    policy: PolicyKind,

    /// CPU load, 0.0-1.0
    #[arg(long, default_value_t = 0.8)]
    load: f32,

    /// Drop the load to zero at this tick
    #[arg(long = "idle-at")]
    idle_at: Option<u32>,

    #[arg(long, default_value_t = 30.0)]
    ambient: f32,

    /// Peak sensor noise in °C
    #[arg(long, default_value_t = 1.0)]
    noise: f32,

    /// Report a garbage duty every N reads
    #[arg(long = "glitch-every")]
    glitch_every: Option<u32>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long)]
    dry_run: bool,

    /// Write the CSV here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn outcome_label(result: &Result<TickOutcome, &FanError>) -> String {
    match result {
        Ok(TickOutcome::Applied { to, .. }) => format!("apply {}", to),
        Ok(TickOutcome::DryRun { to, .. }) => format!("dry-run {}", to),
        Ok(TickOutcome::Suppressed(reason)) => format!("{:?}", reason),
        Err(e) => format!("skip: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let control = ControlConfig {
        period_s: cli.period_s,
        mavg_window_s: cli.mavg_window_s,
        dry_run: cli.dry_run,
        policy: cli.policy,
        ..ControlConfig::default()
    };

    let mut model = ThermalModel::new(cli.ambient, cli.load, cli.seed);
    model.noise = cli.noise;
    model.glitch_every = cli.glitch_every;
    let ec = SimulatedEc::new(model, cli.period_s as f32);

    let mut fan_loop = FanLoop::new(ec.clone(), ec.clone(), &control)?;

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    writeln!(out, "tick,temp,smoothed,duty,outcome")?;

    let start = Instant::now();
    let period = Duration::from_secs(cli.period_s);
    for i in 0..cli.ticks {
        if cli.idle_at == Some(i) {
            ec.set_load(0.0).await;
        }
        let now = start + period * i;
        match fan_loop.tick_at(now).await {
            Ok(tick) => writeln!(
                out,
                "{},{},{},{},{}",
                i,
                tick.sample.temperature,
                tick.smoothed,
                tick.sample.duty,
                outcome_label(&Ok(tick.outcome))
            )?,
            Err(e) => writeln!(out, "{},,,,{}", i, outcome_label(&Err(&e)))?,
        }
    }

    let model = ec.snapshot().await;
    eprintln!(
        "final: {:.1}°C at {}% ({} writes)",
        model.die_temp,
        model.duty,
        model.writes.len()
    );
    Ok(())
}
