//! Analyze command - extract ledger data from a single illustration.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use inforce_core::{Analyzer, PatternRecognizer};

use super::load_config;
use super::output::{OutputFormat, format_result, write_artifacts};

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Directory for the redacted PDF and proof snips
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Decision threshold (0.0 - 1.0), overrides config and environment
    #[arg(long)]
    threshold: Option<f64>,

    /// Show confidence and timing after the output
    #[arg(long)]
    show_confidence: bool,
}

pub async fn run(args: AnalyzeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(threshold) = args.threshold {
        config.analysis.confidence_threshold = threshold;
        config.validate()?;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Analyzing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Analyzing PDF...");

    let data = fs::read(&args.input)?;
    let recognizer = PatternRecognizer::new();
    let analyzer = Analyzer::new(config, &recognizer);
    let result = analyzer.analyze(&data);
    pb.finish_and_clear();
    let result = result?;

    if let Some(dir) = &args.artifacts {
        let stem = args
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("illustration");
        let written = write_artifacts(&result, dir, stem)?;
        eprintln!(
            "{} {} artifacts written to {}",
            style("✓").green(),
            written,
            dir.display()
        );
    }

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        let verdict = if result.decision_ready {
            style("decision ready").green()
        } else {
            style("needs manual review").yellow()
        };
        eprintln!();
        eprintln!(
            "{} Confidence: {:.1}% ({})",
            style("ℹ").blue(),
            result.confidence_overall * 100.0,
            verdict
        );
        eprintln!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            start.elapsed().as_millis()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
