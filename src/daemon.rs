use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::domains::{NodeInfo, Payload};
use crate::error::{NodeMonError, Result};
use crate::node::NodeMon;
use crate::providers::memory::MemoryWorldState;
use crate::services::client_server::ClientServer;
use crate::services::transport::UdpMessenger;

const CLIENT_BACKLOG: usize = 256;

pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let messenger = Arc::new(UdpMessenger::bind(&config.network.bind).await?);
    for peer in &config.network.peers {
        let addr: SocketAddr = peer
            .addr
            .parse()
            .map_err(|e| NodeMonError::Config(format!("peer {}: {e}", peer.node_id)))?;
        messenger.add_peer(&peer.node_id, addr, &peer.groups).await;
    }

    let local_addr = messenger.local_addr()?;
    let node_id = config
        .node_id
        .clone()
        .unwrap_or_else(|| local_addr.to_string());
    let world_state = Arc::new(MemoryWorldState::new(node_id.clone()));
    let node = Arc::new(NodeMon::new(&config, messenger.clone(), world_state)?);
    node.start();
    info!(node_id = %node_id, addr = %local_addr, mtu = config.mtu, "node started");

    let receiver = messenger.spawn_receiver(node.clone(), config.local_group_id.clone());

    if let Some(proxy) = node.proxy() {
        let server = ClientServer::bind(&config.network.clients_bind, proxy.clone(), CLIENT_BACKLOG)
            .await?;
        tokio::spawn(async move {
            if let Err(err) = server.run().await {
                error!(error = %err, "client server stopped");
            }
        });
    }

    let started = Instant::now();
    let mut ticker = tokio::time::interval(config.heartbeat_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let dispatch = node.publish(Payload::Info(local_info(started)));
                if dispatch.dropped() > 0 {
                    warn!(dropped = dispatch.dropped(), "heartbeat not fully queued");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| NodeMonError::Runtime(e.to_string()))?;
                info!("shutting down");
                break;
            }
        }
    }

    node.stop();
    receiver.abort();
    Ok(())
}

fn local_info(started: Instant) -> NodeInfo {
    NodeInfo {
        hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        os: std::env::consts::OS.to_string(),
        uptime_secs: started.elapsed().as_secs(),
        ..NodeInfo::default()
    }
}
