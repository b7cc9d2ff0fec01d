use std::path::PathBuf;

use clap::Parser;
use mapreduce_rs::mr::{coordinator, plugin, worker};

/// Launch a MapReduce worker: repeatedly asks the coordinator for a task,
/// executes it with the named plugin, and reports back.
#[derive(Parser)]
#[command(name = "mrworker")]
#[command(about = "Run a MapReduce worker process", long_about = None)]
struct Cli {
    /// Name of the registered plugin to run (see `--list-plugins`).
    plugin: Option<String>,

    /// Print the names of all registered plugins and exit.
    #[arg(long)]
    list_plugins: bool,

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

    if cli.list_plugins {
        for name in plugin::available_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let plugin_name = cli
        .plugin
        .ok_or_else(|| anyhow::anyhow!("a plugin name is required (see --list-plugins)"))?;
    let plugin = plugin::resolve(&plugin_name)?;

    let socket_path = cli.socket.unwrap_or_else(coordinator::default_socket_path);
    tracing::info!(plugin = plugin_name, socket = %socket_path.display(), "starting worker");

    worker::run(&socket_path, plugin).await
}
