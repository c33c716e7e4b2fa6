use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use semibook::config::BookOptions;
use semibook::replay::{Recording, ReplayEngine};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semibook-replay")]
#[command(about = "Rebuild a cached book from a recorded activation", long_about = None)]
struct Cli {
    /// Recording file (JSON)
    recording: PathBuf,

    /// Book options file (JSON); defaults apply to missing fields
    #[arg(long)]
    options: Option<PathBuf>,

    /// Fail unless the rebuilt book has this checksum
    #[arg(long)]
    expect_checksum: Option<String>,

    /// Print the replay metrics alongside the offers
    #[arg(long, default_value_t = false)]
    metrics: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let options = match &cli.options {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading options {}", path.display()))?;
            BookOptions::from_json(&raw)?
        }
        None => BookOptions::default(),
    };

    let raw = fs::read_to_string(&cli.recording)
        .with_context(|| format!("reading recording {}", cli.recording.display()))?;
    let recording = Recording::from_json(&raw).context("parsing recording")?;

    let mut engine = ReplayEngine::new(options);
    if let Some(checksum) = cli.expect_checksum {
        engine = engine.with_expected_checksum(checksum);
    }
    let result = engine.replay(&recording)?;

    let output = if cli.metrics {
        json!({ "offers": result.offers, "metrics": result.metrics })
    } else {
        json!(result.offers)
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
