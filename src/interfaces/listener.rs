use async_trait::async_trait;

use crate::domains::NodeRecord;
use crate::error::Result;

/// A locally attached client process fed by the proxy scheduler.
#[async_trait]
pub trait ClientListener: Send + Sync {
    fn id(&self) -> &str;
    async fn on_data_update(&self, node_id: &str, bytes: &[u8]) -> Result<()>;
    async fn on_world_state(&self, records: &[NodeRecord]) -> Result<()>;
}
