use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{NodeMonError, Result};
use crate::interfaces::messenger::{MessageHandler, Messenger};

const MAX_DATAGRAM: usize = 65_507;

/// Datagram messenger over a static peer table.
///
/// Node ids resolve to one address; group ids resolve to the addresses of
/// every member, so a send to a group id fans out to all of them.
pub struct UdpMessenger {
    socket: Arc<UdpSocket>,
    peers: RwLock<HashMap<String, SocketAddr>>,
    groups: RwLock<HashMap<String, Vec<String>>>,
}

impl UdpMessenger {
    pub async fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| NodeMonError::Transport(e.to_string()))?;
        Ok(Self {
            socket: Arc::new(socket),
            peers: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| NodeMonError::Transport(e.to_string()))
    }

    pub async fn add_peer(&self, node_id: &str, addr: SocketAddr, groups: &[String]) {
        self.peers.write().await.insert(node_id.to_string(), addr);
        let mut table = self.groups.write().await;
        for group in groups {
            let members = table.entry(group.clone()).or_default();
            if !members.iter().any(|member| member == node_id) {
                members.push(node_id.to_string());
            }
        }
    }

    pub async fn remove_peer(&self, node_id: &str) {
        self.peers.write().await.remove(node_id);
        for members in self.groups.write().await.values_mut() {
            members.retain(|member| member != node_id);
        }
    }

    async fn node_for(&self, addr: SocketAddr) -> String {
        self.peers
            .read()
            .await
            .iter()
            .find(|(_, peer)| **peer == addr)
            .map(|(node_id, _)| node_id.clone())
            .unwrap_or_else(|| addr.to_string())
    }

    /// Feeds every received datagram to `handler` as a message on `group_id`.
    pub fn spawn_receiver(
        self: &Arc<Self>,
        handler: Arc<dyn MessageHandler>,
        group_id: String,
    ) -> JoinHandle<()> {
        let messenger = self.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                let (len, from) = match messenger.socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(err) => {
                        warn!(error = %err, "udp receive failed");
                        continue;
                    }
                };
                let node_id = messenger.node_for(from).await;
                handler.on_message(&group_id, &node_id, &buf[..len]).await;
            }
        })
    }
}

#[async_trait]
impl Messenger for UdpMessenger {
    async fn send_message(&self, node_id: &str, bytes: &[u8]) -> Result<()> {
        if self.groups.read().await.contains_key(node_id) {
            return self.broadcast_message(node_id, bytes).await;
        }
        let addr = self
            .peers
            .read()
            .await
            .get(node_id)
            .copied()
            .ok_or_else(|| NodeMonError::Transport(format!("unknown node {node_id}")))?;
        self.socket
            .send_to(bytes, addr)
            .await
            .map_err(|e| NodeMonError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn broadcast_message(&self, group_id: &str, bytes: &[u8]) -> Result<()> {
        let members = self
            .groups
            .read()
            .await
            .get(group_id)
            .cloned()
            .ok_or_else(|| NodeMonError::Transport(format!("unknown group {group_id}")))?;
        let peers = self.peers.read().await;
        for member in members {
            let Some(addr) = peers.get(&member) else {
                continue;
            };
            if let Err(err) = self.socket.send_to(bytes, *addr).await {
                warn!(node_id = %member, error = %err, "udp send failed");
            }
        }
        debug!(group = group_id, bytes = bytes.len(), "broadcast sent");
        Ok(())
    }
}
