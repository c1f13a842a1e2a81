use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domains::topology::{Link, Topology};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub hostname: String,
    pub os: String,
    pub uptime_secs: u64,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub members: Vec<String>,
}

/// Everything known about one node, as handed to clients in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub info: Option<NodeInfo>,
    pub group: Option<GroupInfo>,
    pub links: Vec<Link>,
    pub topology: Option<Topology>,
    pub updated_at: i64,
}

impl NodeRecord {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            info: None,
            group: None,
            links: Vec::new(),
            topology: None,
            updated_at: 0,
        }
    }
}
