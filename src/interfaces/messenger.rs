use async_trait::async_trait;

use crate::error::Result;

/// Outbound side of the group-communication substrate.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, node_id: &str, bytes: &[u8]) -> Result<()>;
    async fn broadcast_message(&self, group_id: &str, bytes: &[u8]) -> Result<()>;
}

/// Inbound side: the substrate calls this for every payload it receives.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, group_id: &str, node_id: &str, bytes: &[u8]);
}
