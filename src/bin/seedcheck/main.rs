// src/bin/seedcheck/main.rs - Seedcheck CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use seedcheck::report::RunDigest;
use seedcheck::{
    Config, Features, HarnessMetrics, HarnessSummary, Orchestrator, SampleDataset,
    ShutdownCoordinator,
};

#[derive(Parser)]
#[command(name = "seedcheck")]
#[command(about = "Seed sample records into storage backends, read them back and verify them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed and verify the configured backends
    Run {
        /// Configuration file (TOML, JSON or YAML)
        #[arg(short, long, env = "SEEDCHECK_CONFIG")]
        config: Option<PathBuf>,

        /// Only run the named backend (repeatable)
        #[arg(short, long = "backend")]
        backends: Vec<String>,

        /// Route every backend through the in-memory simulated transport
        #[arg(long)]
        simulate: bool,

        /// Write Prometheus metrics to this file after the run
        #[arg(long)]
        metrics_out: Option<PathBuf>,

        /// Print one JSON digest per backend instead of text
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long, env = "SEEDCHECK_CONFIG")]
        config: Option<PathBuf>,
    },
    /// List configured backends
    Backends {
        #[arg(short, long, env = "SEEDCHECK_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print the sample dataset
    Dataset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "seedcheck=debug" } else { "seedcheck=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Run {
            config,
            backends,
            simulate,
            metrics_out,
            json,
        } => handle_run(config.as_deref(), &backends, simulate, metrics_out.as_deref(), json).await?,
        Commands::Validate { config } => handle_validate(config.as_deref())?,
        Commands::Backends { config } => handle_backends(config.as_deref())?,
        Commands::Dataset => handle_dataset()?,
    };

    std::process::exit(exit_code);
}

/// Load the given file, or fall back to the built-in presets when no file
/// defines any backend
fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::load(path).context("loading configuration")?;
    if config.backends.is_empty() && path.is_none() {
        info!("📋 No configuration file given, using the built-in backend presets");
        let harness = config.harness.clone();
        config = Config::sample();
        config.harness = harness;
    }
    Ok(config)
}

async fn handle_run(
    path: Option<&Path>,
    backends: &[String],
    simulate: bool,
    metrics_out: Option<&Path>,
    json: bool,
) -> Result<i32> {
    info!(
        version = seedcheck::VERSION,
        features = ?Features::new().list_enabled(),
        "🚀 seedcheck starting"
    );
    let mut config = load_config(path)?;
    config.select(backends)?;
    if simulate {
        info!("🧪 Simulation mode: every backend uses the in-memory transport");
        config.force_simulated();
    }

    let validation = config.validate_detailed();
    for warning in &validation.warnings {
        warn!("⚠️  {}: {}", warning.field, warning.message);
    }
    if !validation.success {
        for e in &validation.errors {
            error!("❌ {}: {}", e.field, e.message);
        }
        println!("FAILED: configuration is invalid");
        return Ok(1);
    }

    let summary = config.summary();
    info!(
        "📊 {} enabled backends ({} simulated, {} live, {} verify-only)",
        summary.backends_enabled,
        summary.simulated_backends,
        summary.live_backends,
        summary.verify_only_backends
    );

    let metrics = HarnessMetrics::new().context("creating metrics registry")?;
    let shutdown = ShutdownCoordinator::new();
    shutdown.listen_for_signals();

    let orchestrator = Orchestrator::new(SampleDataset::standard().shared())
        .with_metrics(metrics.clone())
        .with_shutdown(shutdown.signal());

    let plans = Orchestrator::plan(&config);
    let reports = orchestrator
        .run_all(plans, config.harness.max_concurrency)
        .await;
    let summary = HarnessSummary::new(reports);

    if json {
        for report in &summary.reports {
            println!("{}", serde_json::to_string(&RunDigest::from(report))?);
        }
        println!("{}", summary.final_message());
    } else {
        println!("{}", summary.render());
    }

    if let Some(out) = metrics_out {
        let text = metrics.gather_text().context("encoding metrics")?;
        std::fs::write(out, text).with_context(|| format!("writing metrics to {}", out.display()))?;
        info!("📈 Metrics written to {}", out.display());
    }

    Ok(summary.exit_code())
}

fn handle_validate(path: Option<&Path>) -> Result<i32> {
    let config = load_config(path)?;
    let result = config.validate_detailed();

    for e in &result.errors {
        println!("❌ {}: {}", e.field, e.message);
        if let Some(suggestion) = &e.suggested_fix {
            println!("   💡 {}", suggestion);
        }
    }
    for warning in &result.warnings {
        println!("⚠️  {}: {}", warning.field, warning.message);
    }

    if result.success {
        println!(
            "✅ Configuration is valid ({} backends, checked in {:.1}ms)",
            config.backends.len(),
            result.duration.as_secs_f64() * 1000.0
        );
        Ok(0)
    } else {
        println!("FAILED: {} configuration errors", result.errors.len());
        Ok(1)
    }
}

fn handle_backends(path: Option<&Path>) -> Result<i32> {
    let config = load_config(path)?;
    println!(
        "{:<22} {:<12} {:<10} {:<16} {:<8}",
        "NAME", "KIND", "TRANSPORT", "MODE", "ENABLED"
    );
    for backend in &config.backends {
        println!(
            "{:<22} {:<12} {:<10} {:<16} {:<8}",
            backend.name,
            backend.kind,
            backend.transport,
            backend.mode.as_str(),
            if backend.enabled { "yes" } else { "no" }
        );
    }

    let live = Features::new().live_backends();
    println!("\nLive transports in this build: {}", live.join(", "));
    Ok(0)
}

fn handle_dataset() -> Result<i32> {
    let dataset = SampleDataset::standard();
    for record in dataset.records() {
        println!("{}", record.to_canonical_json());
    }
    Ok(0)
}
