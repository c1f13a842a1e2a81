use std::collections::HashMap;
use std::sync::RwLock;

use crate::domains::envelope::now_ms;
use crate::domains::{Envelope, Link, MessageType, NodeRecord, Payload};
use crate::error::{NodeMonError, Result};
use crate::interfaces::world_state::WorldState;

/// Node records held in memory.
///
/// LINK and TOPOLOGY fragments of one source envelope share its timestamp:
/// fragments with the stamp already seen for a node are folded in, a new
/// stamp replaces the previous data.
pub struct MemoryWorldState {
    local_node_id: String,
    nodes: RwLock<HashMap<String, Entry>>,
}

struct Entry {
    record: NodeRecord,
    links_stamp: i64,
    topology_stamp: i64,
}

impl MemoryWorldState {
    pub fn new(local_node_id: impl Into<String>) -> Self {
        Self {
            local_node_id: local_node_id.into(),
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, node_id: &str) -> Option<NodeRecord> {
        self.nodes
            .read()
            .ok()
            .and_then(|guard| guard.get(node_id).map(|entry| entry.record.clone()))
    }

    pub fn len(&self) -> usize {
        self.nodes.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorldState for MemoryWorldState {
    fn local_node_id(&self) -> String {
        self.local_node_id.clone()
    }

    fn update_data(&self, node_id: &str, envelope: &Envelope) -> Result<()> {
        if envelope.message_type() != MessageType::UpdateData {
            return Err(NodeMonError::WorldState(format!(
                "cannot apply {:?} to node {node_id}",
                envelope.message_type()
            )));
        }
        if node_id.is_empty() {
            return Err(NodeMonError::WorldState("envelope has no data node".to_string()));
        }

        let mut guard = self
            .nodes
            .write()
            .map_err(|e| NodeMonError::WorldState(e.to_string()))?;
        let entry = guard.entry(node_id.to_string()).or_insert_with(|| Entry {
            record: NodeRecord::new(node_id),
            links_stamp: i64::MIN,
            topology_stamp: i64::MIN,
        });
        let stamp = envelope.timestamp();
        let record = &mut entry.record;
        match envelope.payload().clone() {
            Payload::Link(links) => {
                if entry.links_stamp == stamp {
                    // Same fragment seen twice, e.g. via both groups.
                    if !contains_run(&record.links, &links) {
                        record.links.extend(links);
                    }
                } else {
                    record.links = links;
                    entry.links_stamp = stamp;
                }
            }
            Payload::Topology(fragment) => match record.topology.as_mut() {
                Some(topology) if entry.topology_stamp == stamp => topology.merge(fragment),
                _ => {
                    record.topology = Some(fragment);
                    entry.topology_stamp = stamp;
                }
            },
            Payload::Group(group) => record.group = Some(group),
            Payload::Info(info) => record.info = Some(info),
            Payload::Empty => {}
        }
        record.updated_at = now_ms();
        Ok(())
    }

    fn nodes_snapshot(&self) -> Vec<NodeRecord> {
        let mut records: Vec<NodeRecord> = self
            .nodes
            .read()
            .map(|guard| guard.values().map(|entry| entry.record.clone()).collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        records
    }
}

fn contains_run(links: &[Link], batch: &[Link]) -> bool {
    batch.is_empty() || links.windows(batch.len()).any(|window| window == batch)
}
