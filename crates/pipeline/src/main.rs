use anyhow::Result;
use clap::Parser;
use pipeline::{OperationMode, Pipeline, PipelineConfig, write_outputs};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kg-analyse", author, version, about = "Merge extracted documents into a knowledge graph and analyse it", long_about = None)]
struct Args {
    /// JSON document, combined JSON file, or directory of JSON documents
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "analysis")]
    output: PathBuf,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// fast, balanced or thorough (overrides config file)
    #[arg(long)]
    mode: Option<OperationMode>,

    /// Traversal seed label (repeatable)
    #[arg(long = "seed")]
    seeds: Vec<String>,

    /// Approximate betweenness from K sampled nodes (0 = exact)
    #[arg(long)]
    betweenness_sample: Option<usize>,

    /// Run statistical validation regardless of mode
    #[arg(long)]
    validation: bool,

    /// Keep only the first N documents
    #[arg(long)]
    max_documents: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = PipelineConfig::load(args.config.as_deref(), args.mode).await?;

    // Apply CLI overrides
    if !args.seeds.is_empty() {
        config.analysis.seeds = args.seeds;
    }
    if let Some(sample) = args.betweenness_sample {
        config.analysis.betweenness_sample = sample;
    }
    if args.validation {
        config.analysis.validation = true;
    }
    if let Some(max) = args.max_documents {
        config.build.max_documents = max;
    }

    info!(mode = ?config.mode, input = %args.input.display(), "Starting analysis");
    let outcome = Pipeline::new(config).run(&args.input).await?;
    write_outputs(&outcome, &args.output).await?;

    info!(
        nodes = outcome.report.build.n_nodes,
        edges = outcome.report.build.n_edges,
        total_ms = outcome.report.timings.total_ms,
        output = %args.output.display(),
        "Done"
    );
    Ok(())
}
