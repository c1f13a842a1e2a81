use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub interface: Option<String>,
    pub latency_ms: Option<u32>,
    pub description: String,
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            interface: None,
            latency_ms: None,
            description: String::new(),
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub ip: String,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub last_seen: i64,
}

impl Host {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: None,
            hostname: None,
            last_seen: 0,
        }
    }
}

pub type HostMap = BTreeMap<String, Host>;

/// Network view observed by one node. Maps are keyed by IP and ordered, so
/// walking them always yields the same sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub network_name: String,
    pub subnet_mask: String,
    pub internals: HostMap,
    pub externals: HostMap,
    pub local_gws: HostMap,
    pub remote_gws: HostMap,
    pub timestamp: i64,
}

impl Topology {
    pub fn new(network_name: impl Into<String>, subnet_mask: impl Into<String>) -> Self {
        Self {
            network_name: network_name.into(),
            subnet_mask: subnet_mask.into(),
            ..Self::default()
        }
    }

    /// Same network metadata, no hosts and no gateways.
    pub fn shell(&self) -> Self {
        Self {
            network_name: self.network_name.clone(),
            subnet_mask: self.subnet_mask.clone(),
            timestamp: self.timestamp,
            ..Self::default()
        }
    }

    pub fn host_count(&self) -> usize {
        self.internals.len() + self.externals.len()
    }

    pub fn has_gateways(&self) -> bool {
        !self.local_gws.is_empty() || !self.remote_gws.is_empty()
    }

    /// Folds a fragment into this view. Hosts accumulate; gateways are replaced
    /// only by a fragment that carries them.
    pub fn merge(&mut self, fragment: Topology) {
        self.network_name = fragment.network_name;
        self.subnet_mask = fragment.subnet_mask;
        self.timestamp = self.timestamp.max(fragment.timestamp);
        self.internals.extend(fragment.internals);
        self.externals.extend(fragment.externals);
        if !fragment.local_gws.is_empty() || !fragment.remote_gws.is_empty() {
            self.local_gws = fragment.local_gws;
            self.remote_gws = fragment.remote_gws;
        }
    }
}
