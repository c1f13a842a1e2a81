use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nodemon::config::{Config, PeerConfig};
use nodemon::daemon;
use nodemon::error::{NodeMonError, Result};

#[derive(Parser, Debug)]
#[command(name = "nodemon")]
#[command(about = "Node state dissemination daemon")]
struct Cli {
    #[arg(long, env = "NODEMON_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    node_id: Option<String>,

    #[arg(long)]
    bind: Option<String>,

    /// Peer as `node_id=host:port[@group,group]`.
    #[arg(long = "peer")]
    peers: Vec<String>,

    #[arg(long, default_value_t = false)]
    clients: bool,

    #[arg(long)]
    mtu: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nodemon=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?.apply_env()?;
    if let Some(node_id) = cli.node_id {
        config.node_id = Some(node_id);
    }
    if let Some(bind) = cli.bind {
        config.network.bind = bind;
    }
    if let Some(mtu) = cli.mtu {
        config.mtu = mtu;
    }
    if cli.clients {
        config.clients_delivery = true;
    }
    for raw in &cli.peers {
        config.network.peers.push(parse_peer(raw, &config.local_group_id)?);
    }

    daemon::run(config).await
}

fn parse_peer(raw: &str, default_group: &str) -> Result<PeerConfig> {
    let (node_id, rest) = raw
        .split_once('=')
        .ok_or_else(|| NodeMonError::Config(format!("peer must be node_id=addr: {raw}")))?;
    let (addr, groups) = match rest.split_once('@') {
        Some((addr, groups)) => (
            addr,
            groups
                .split(',')
                .map(str::trim)
                .filter(|group| !group.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        None => (rest, vec![default_group.to_string()]),
    };
    Ok(PeerConfig {
        node_id: node_id.trim().to_string(),
        addr: addr.trim().to_string(),
        groups,
    })
}
