//! minis3 storage node - serves blobs from a local directory

use clap::Parser;
use minis3_cli::{init_tracing, run_node_server_with_shutdown, server, NodeServerConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minis3-node")]
#[command(about = "Storage node for the minis3 object store")]
#[command(version)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "MINIS3_NODE_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(short = 'H', long, env = "MINIS3_NODE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MINIS3_NODE_PORT")]
    port: Option<u16>,

    /// Directory blobs are stored under
    #[arg(short = 'b', long, env = "MINIS3_NODE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "MINIS3_NODE_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "MINIS3_NODE_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.debug, args.json_logs);

    let mut config = match &args.config {
        Some(path) => NodeServerConfig::from_file(path)?,
        None => NodeServerConfig::default(),
    };

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(base_dir) = args.base_dir {
        config.base_dir = base_dir;
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        base_dir = %config.base_dir.display(),
        "starting minis3 storage node"
    );

    run_node_server_with_shutdown(config, server::ctrl_c()).await
}
