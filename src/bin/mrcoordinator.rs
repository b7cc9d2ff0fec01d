use std::path::PathBuf;

use clap::Parser;
use mapreduce_rs::mr::coordinator::{self, Coordinator};

/// Launch the MapReduce coordinator: assigns map and reduce tasks to
/// worker processes over a local rendezvous socket.
#[derive(Parser)]
#[command(name = "mrcoordinator")]
#[command(about = "Run the MapReduce coordinator", long_about = None)]
struct Cli {
    /// Input files, one map task per file.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Number of reduce tasks to partition keys into.
    #[arg(short = 'r', long, default_value = "10")]
    reduce_fanout: usize,

    /// Rendezvous socket path. Defaults to `$MAPREDUCE_SOCKET` or
    /// `/var/tmp/mapreduce-master.sock`.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace, -vvv for full detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    mapreduce_rs::logging::init(cli.verbose);

    let socket_path = cli.socket.unwrap_or_else(coordinator::default_socket_path);
    let inputs: Vec<String> = cli
        .inputs
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    tracing::info!(
        maps = inputs.len(),
        reduce_fanout = cli.reduce_fanout,
        socket = %socket_path.display(),
        "starting coordinator"
    );

    let coordinator = Coordinator::new(inputs, cli.reduce_fanout);
    let _lease_daemon = coordinator.spawn_lease_daemon();
    let _rpc_server = coordinator::serve(coordinator.clone(), &socket_path).await?;

    while !coordinator.done() {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }

    tracing::info!("job complete, coordinator exiting");
    Ok(())
}
