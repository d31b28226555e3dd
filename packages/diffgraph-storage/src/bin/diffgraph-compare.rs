//! Ad-hoc comparison CLI: runs one primary/secondary comparison against a
//! pair of JSON fixture files (see [`diffgraph_storage::fixture`]) and
//! writes the resulting `FixedPoint`s as JSON lines, to a file or stdout.
//!
//! A real disassembler-export loader, results-database persistence, and a
//! viewer UI are all out of scope (spec §1); this binary exists to drive
//! the engine end to end for manual testing and small demos.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use diffgraph_core::engine::ExecutableFactory;
use diffgraph_core::{CancellationFlag, Comparison, MatchingConfig};
use diffgraph_storage::{JsonFixtureLoader, JsonLinesWriter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diffgraph-compare")]
#[command(about = "Compares two JSON-fixture call graphs and prints the matched FixedPoints", long_about = None)]
struct Cli {
    /// Path to the primary (reference) call graph fixture.
    primary: PathBuf,

    /// Path to the secondary (new variant) call graph fixture.
    secondary: PathBuf,

    /// Write JSON lines here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Discard FixedPoints below this confidence.
    #[arg(long, default_value_t = 0.0)]
    min_confidence: f64,

    /// Discard FixedPoints below this similarity.
    #[arg(long, default_value_t = 0.0)]
    min_similarity: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let loader = JsonFixtureLoader;
    let (primary, _primary_cache) = loader.load(&cli.primary).with_context(|| format!("loading {}", cli.primary.display()))?;
    let (secondary, _secondary_cache) = loader.load(&cli.secondary).with_context(|| format!("loading {}", cli.secondary.display()))?;

    let mut config = MatchingConfig::default();
    config.min_confidence = cli.min_confidence;
    config.min_similarity = cli.min_similarity;

    let comparison = Comparison::new(&primary, &secondary, config).context("invalid matching configuration")?;
    let fixed_points = comparison.run(&CancellationFlag::new()).context("comparison failed")?;

    let sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(File::create(path).with_context(|| format!("creating {}", path.display()))?),
        None => Box::new(io::stdout()),
    };
    let writer = JsonLinesWriter::new(sink);
    for fp in &fixed_points {
        writer.write(fp).context("writing fixed point")?;
    }

    tracing::info!(
        matched = fixed_points.len(),
        primary_functions = primary.function_count(),
        secondary_functions = secondary.function_count(),
        "comparison complete"
    );
    Ok(())
}
