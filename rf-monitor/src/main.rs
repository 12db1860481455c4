//! 433MHz Signal Monitor
//!
//! Runs the configured signal subscribers against virtual radio channels,
//! replays a script of received and transmitted frames, and logs every
//! event the subscribers produce.

mod config;
mod monitor;
mod replay;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use config::MonitorConfig;
use monitor::Monitor;
use replay::Script;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Replay RF traffic through the signal manager
#[derive(Parser, Debug)]
#[command(name = "rf-monitor", version)]
#[command(about = "Replay RF traffic through the 433MHz signal manager")]
struct Args {
    /// Configuration file (defaults to the XDG config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay script; reads stdin when omitted
    script: Option<PathBuf>,

    /// Print the event summary as JSON
    #[arg(long)]
    json: bool,
}

fn read_script(path: Option<&PathBuf>) -> Result<Script> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?,
    };
    Ok(text.parse()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rf_monitor=info,rf_signal=info,rf_protocol=info,rf_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = MonitorConfig::load(args.config.as_deref())?;
    let script = read_script(args.script.as_ref())?;

    tracing::info!(
        "Starting rf-monitor with {} subscribers, {} steps",
        config.subscribers.len(),
        script.steps().len()
    );

    let monitor = Monitor::new(&config);
    monitor.register_all().await;
    let outcome = monitor.replay(&script).await;
    tracing::info!("Channels opened: {:?}", monitor.radio().signatures());
    let summary = monitor.shutdown().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for (name, counts) in &summary {
            tracing::info!(
                "[{}] payload={} data={} payload_send={} error={}",
                name,
                counts.payload,
                counts.data,
                counts.payload_send,
                counts.error
            );
        }
    }

    outcome
}
