use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use siphon::config::{EngineConfig, SourceManifest};
use siphon::scheduler::SignalScheduler;

#[derive(Parser)]
#[command(
    name = "siphon",
    version,
    about = "Signal ingestion engine: polls content sources on per-source schedules",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion engine
    Run {
        /// Source manifest file ([[sources]] tables)
        #[arg(short, long, default_value = "sources.toml")]
        sources: PathBuf,
    },

    /// Validate configuration and the source manifest, then exit
    Check {
        /// Source manifest file ([[sources]] tables)
        #[arg(short, long, default_value = "sources.toml")]
        sources: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose)?;

    match cli.command {
        Commands::Run { sources } => run(config, &sources).await,
        Commands::Check { sources } => check(config, &sources),
    }
}

fn init_tracing(config: &EngineConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("siphon={level},info")));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("initializing json tracing subscriber")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("initializing tracing subscriber")?;
    }
    Ok(())
}

async fn run(config: EngineConfig, sources_path: &PathBuf) -> Result<()> {
    if let Err(e) = siphon::metrics::init_metrics() {
        tracing::warn!("metrics initialization failed, continuing without: {e}");
    }

    let manifest = SourceManifest::from_file(sources_path)?;
    tracing::info!(
        sources = manifest.sources.len(),
        manifest = %sources_path.display(),
        "loaded source manifest"
    );

    let scheduler = SignalScheduler::new(config.clone());
    for source in manifest.sources {
        let id = source.id.clone();
        scheduler
            .add_source(source)
            .await
            .with_context(|| format!("registering source '{id}'"))?;
    }

    scheduler.start().await?;

    let server_handle = if config.http.enable_status_server {
        let addr = config.http.bind_addr.clone();
        let server_scheduler = scheduler.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = siphon::server::serve(&addr, server_scheduler, shutdown_signal()).await
            {
                tracing::error!("status server failed: {e}");
            }
        }))
    } else {
        None
    };

    shutdown_signal().await;
    tracing::info!("shutdown signal received");

    scheduler.stop().await;
    if let Some(handle) = server_handle {
        let _ = handle.await;
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn check(config: EngineConfig, sources_path: &PathBuf) -> Result<()> {
    config.validate()?;
    let manifest = SourceManifest::from_file(sources_path)?;
    println!("configuration OK");
    println!("{} source(s):", manifest.sources.len());
    for source in &manifest.sources {
        let pattern = siphon::scheduler::SchedulePattern::from_interval_minutes(
            source.polling.interval_minutes,
        );
        println!(
            "  {:<20} {:<8} {:<10} {}",
            source.id,
            source.source_type,
            source.status,
            pattern
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        // fall back to sleeping forever rather than busy-looping
        std::future::pending::<()>().await;
    }
}
