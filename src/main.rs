use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dispwatch::{export, Dashboard, Settings};

#[derive(Parser, Debug)]
#[command(name = "dispwatch")]
#[command(about = "Displacement sensor dashboard with live synthetic updates")]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between live updates (overrides the settings file)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Simulated fetch latency in milliseconds
    #[arg(long)]
    latency: Option<u64>,

    /// Seed for reproducible readings
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many updates (runs until Ctrl-C when omitted)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    ticks: Option<u64>,

    /// Apply updates immediately instead of waiting for the live schedule
    #[arg(short, long, requires = "ticks")]
    manual: bool,

    /// Export current state to a JSON file and exit
    #[arg(short, long, conflicts_with_all = ["ticks", "manual"])]
    export: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings =
        Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(interval) = args.interval {
        settings.update_interval_secs = interval;
    }
    if let Some(latency) = args.latency {
        settings.fetch_latency_ms = latency;
    }
    if args.seed.is_some() {
        settings.seed = args.seed;
    }
    settings.validate().context("Invalid command line override")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, settings))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(args: Args, settings: Settings) -> Result<()> {
    let dashboard = settings.build_dashboard();
    dashboard.initialize().await;
    print!("{}", dashboard.summary());

    if let Some(path) = args.export {
        export::write_export(&dashboard, &path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        println!("Exported dashboard state to: {}", path.display());
        return Ok(());
    }

    if let (true, Some(ticks)) = (args.manual, args.ticks) {
        for _ in 0..ticks {
            dashboard.trigger_manual_update();
            print!("{}", dashboard.summary());
        }
        return Ok(());
    }

    run_live(&dashboard, args.ticks).await;
    Ok(())
}

/// Run live updates until `ticks` updates have been applied or Ctrl-C.
async fn run_live(dashboard: &Arc<Dashboard>, ticks: Option<u64>) {
    let mut updates = dashboard.subscribe();
    dashboard.start_live_updates();

    let printer = async {
        while updates.changed().await.is_ok() {
            let revision = *updates.borrow_and_update();
            print!("{}", dashboard.summary());
            if ticks.is_some_and(|t| revision >= t) {
                break;
            }
        }
    };

    tokio::select! {
        _ = printer => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
    }

    dashboard.stop_live_updates();
}
