//! Redact command - remove identifying text from a PDF.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use inforce_core::{Analyzer, PatternRecognizer};

use super::load_config;

/// Arguments for the redact command.
#[derive(Args)]
pub struct RedactArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF
    #[arg(short, long, required = true)]
    output: PathBuf,
}

pub async fn run(args: RedactArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    info!("Redacting file: {}", args.input.display());

    let data = fs::read(&args.input)?;
    let recognizer = PatternRecognizer::new();
    let output = Analyzer::new(config, &recognizer).redact(&data)?;

    fs::write(&args.output, &output.document)?;

    for note in &output.notes {
        eprintln!("{} {}", style("!").yellow(), note);
    }
    eprintln!(
        "{} Redacted {} entities, written to {}",
        style("✓").green(),
        output.spans,
        args.output.display()
    );

    Ok(())
}
