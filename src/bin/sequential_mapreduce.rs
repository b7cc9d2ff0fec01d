use std::path::PathBuf;

use clap::Parser;
use mapreduce_rs::mr::{plugin, sequential};

/// Run map and reduce sequentially, in one process, with no coordinator or
/// workers. Useful as a correctness oracle to check a distributed run
/// against.
#[derive(Parser)]
#[command(name = "sequential-mapreduce")]
#[command(about = "Run a MapReduce job sequentially, in a single process", long_about = None)]
struct Cli {
    /// Name of the registered plugin to run.
    plugin: String,

    /// Input files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file path.
    #[arg(short, long, default_value = "mapreduce-out-sequential")]
    output: PathBuf,

    /// Enable verbose output (-v for debug, -vv for trace, -vvv for full detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    mapreduce_rs::logging::init(cli.verbose);

    let plugin = plugin::resolve(&cli.plugin)?;
    let inputs: Vec<String> = cli
        .inputs
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    tracing::info!(plugin = cli.plugin, files = inputs.len(), "running sequential job");
    sequential::run(plugin, &inputs, &cli.output.to_string_lossy())?;
    tracing::info!(output = %cli.output.display(), "sequential job finished");
    Ok(())
}
