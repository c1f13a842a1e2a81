use crate::domains::{Envelope, NodeRecord};
use crate::error::Result;

pub trait WorldState: Send + Sync {
    fn local_node_id(&self) -> String;
    fn update_data(&self, node_id: &str, envelope: &Envelope) -> Result<()>;
    fn nodes_snapshot(&self) -> Vec<NodeRecord>;
}
