//! minis3 gateway - replicated, versioned object storage

use clap::Parser;
use minis3_cli::{init_tracing, run_server_with_shutdown, server, GatewayConfig, NodeSeed};

#[derive(Parser, Debug)]
#[command(name = "minis3-gateway")]
#[command(about = "Gateway for replicated, versioned object storage")]
#[command(version)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "MINIS3_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(short = 'H', long, env = "MINIS3_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MINIS3_PORT")]
    port: Option<u16>,

    /// Default replication factor for uploads
    #[arg(short, long, env = "MINIS3_REPLICATION")]
    replication: Option<usize>,

    /// Storage node to register at startup, as `name=url` (repeatable)
    #[arg(long = "node", value_parser = parse_node_seed)]
    nodes: Vec<NodeSeed>,

    /// Enable debug logging
    #[arg(short, long, env = "MINIS3_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "MINIS3_JSON_LOGS")]
    json_logs: bool,
}

fn parse_node_seed(value: &str) -> Result<NodeSeed, String> {
    let (name, base_url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=url, got '{value}'"))?;
    Ok(NodeSeed {
        name: name.to_string(),
        base_url: base_url.to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.debug, args.json_logs);

    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(replication) = args.replication {
        config.default_replication_factor = replication;
    }
    config.nodes.extend(args.nodes);

    tracing::info!(
        host = %config.host,
        port = config.port,
        replication = config.default_replication_factor,
        "starting minis3 gateway"
    );

    run_server_with_shutdown(config, server::ctrl_c()).await
}
