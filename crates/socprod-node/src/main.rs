//! Socprod Node - Ledger node binary.
//!
//! Loads the configuration, opens the chain store, connects to the
//! bootstrap peers over TCP and runs the node until Ctrl-C.

use clap::Parser;
use socprod_consensus::NodeMode;
use socprod_network::TcpTransport;
use socprod_node::{telemetry, LedgerNode, NodeConfig};
use socprod_storage::{BlockDB, Database};
use socprod_types::PeerId;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "socprod-node")]
#[command(about = "Social Production ledger node")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE", env = "SOCPROD_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Node identity counted in verification votes
    #[arg(long)]
    node_id: Option<String>,

    /// P2P listen address
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// Bootstrap peers (comma-separated, e.g. "127.0.0.1:30400,10.0.0.1:30400")
    #[arg(long)]
    bootstrap: Option<String>,

    /// Relay and track blocks without voting
    #[arg(long)]
    gossip: bool,

    /// Keep the chain in memory only
    #[arg(long)]
    in_memory: bool,

    /// Log level
    #[arg(short, long, env = "SOCPROD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut NodeConfig) {
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(node_id) = &self.node_id {
            config.node_id = node_id.clone();
        }
        if let Some(listen) = &self.listen {
            config.network.listen_addr = listen.clone();
        }
        if let Some(bootstrap) = &self.bootstrap {
            config.network.bootstrap_peers = bootstrap
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if self.gossip {
            config.mode = NodeMode::Gossip;
        }
        if self.in_memory {
            config.storage.in_memory = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.format = "json".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    if let Some(path) = &args.write_config {
        config.to_file(path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    telemetry::init_telemetry(&config.logging)?;

    info!("Configuration:");
    info!("  Name: {}", config.name);
    info!("  Node ID: {}", config.node_id);
    info!("  Mode: {:?}", config.mode);
    info!("  Data dir: {:?}", config.data_dir);
    info!("  Listen: {}", config.network.listen_addr);
    info!("  Bootstrap peers: {}", config.network.bootstrap_peers.len());
    info!("  Sync strategy: {:?}", config.sync.strategy);
    info!("  Verification threshold: {}", config.verification.threshold);

    let store = if config.storage.in_memory {
        BlockDB::in_memory()
    } else {
        let path = config.storage.resolve(&config.data_dir);
        BlockDB::new(Arc::new(Database::open(&path)?))
    };

    let (transport, inbound) =
        TcpTransport::start(config.network.clone(), PeerId::new(config.node_id.clone())).await?;
    let transport = Arc::new(transport);

    let node = LedgerNode::open(&config, store, transport.clone())?;
    let (handle, commands) = node.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            let _ = handle.shutdown().await;
        }
    });

    if let Err(e) = node.run(inbound, commands).await {
        error!("Node error: {}", e);
        transport.shutdown();
        return Err(e.into());
    }

    transport.shutdown();
    info!("Socprod node shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args() {
        let args = Args::parse_from([
            "socprod-node",
            "--node-id",
            "node-a",
            "--bootstrap",
            "127.0.0.1:30401, ,127.0.0.1:30402",
            "--gossip",
        ]);

        let mut config = NodeConfig::default();
        args.apply(&mut config);
        assert_eq!(config.node_id, "node-a");
        assert_eq!(
            config.network.bootstrap_peers,
            vec!["127.0.0.1:30401".to_string(), "127.0.0.1:30402".to_string()]
        );
        assert_eq!(config.mode, NodeMode::Gossip);
        assert!(!config.storage.in_memory);
    }
}
