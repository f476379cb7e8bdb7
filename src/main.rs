use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strainwatch::data::duration::parse_duration;
use strainwatch::{LogNotifier, Monitor, RunSummary, Settings};

#[derive(Parser, Debug)]
#[command(name = "strainwatch")]
#[command(about = "Live divergence monitor for a pair of strain sensor channels")]
struct Args {
    /// Path to a TOML config file (environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Absolute divergence that triggers an alert
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Polling interval (e.g., "120s", "2m")
    #[arg(short, long)]
    interval: Option<String>,

    /// How far back each cycle looks (e.g., "10m")
    #[arg(short, long)]
    window: Option<String>,

    /// Run a single cycle, print the summary and exit
    #[arg(long)]
    once: bool,

    /// Also write the run summary as JSON to this file on exit
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strainwatch=info,strainwatch_adapters=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(threshold) = args.threshold {
        settings.threshold = threshold;
    }
    if let Some(interval) = args.interval {
        parse_duration(&interval).context("Invalid --interval")?;
        settings.interval = interval;
    }
    if let Some(window) = args.window {
        parse_duration(&window).context("Invalid --window")?;
        settings.window = window;
    }

    let mut config = settings.monitor_config()?;
    if args.once {
        config.max_cycles = Some(1);
    }

    let source = settings.sensorcloud_source()?;
    let notifier = LogNotifier::new(settings.element.as_str());

    println!(
        "Monitoring {} vs {} (threshold {:.2}, every {:?}, window {:?})",
        config.monitored_label, config.reference_label, config.threshold, config.interval, config.window
    );

    let summary = Monitor::new(source, notifier, config)
        .run(shutdown_signal())
        .await
        .context("Could not authenticate with the telemetry service")?;

    println!("\n{}", summary);

    if let Some(path) = args.summary_json {
        export_summary(&summary, &path)?;
    }

    Ok(())
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping");
        }
    }
}

/// Write the run summary to a JSON file
fn export_summary(summary: &RunSummary, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;

    println!("Exported run summary to: {}", path.display());
    Ok(())
}
