use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::domains::TransportType;
use crate::error::{NodeMonError, Result};

pub const DEFAULT_MTU: usize = 1400;
pub const DEFAULT_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_THROUGHPUT_INTERVAL_MS: u64 = 100;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_LOCAL_GROUP: &str = "nodemon";
pub const DEFAULT_MASTERS_GROUP: &str = "nodemon-masters";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub node_id: Option<String>,
    pub mtu: usize,
    pub queue_size: usize,
    pub throughput_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub transport: TransportType,
    pub local_delivery: bool,
    pub masters_delivery: bool,
    pub clients_delivery: bool,
    pub local_group_id: String,
    pub masters_group_id: String,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind: String,
    pub clients_bind: String,
    pub peers: Vec<PeerConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PeerConfig {
    pub node_id: String,
    pub addr: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: None,
            mtu: DEFAULT_MTU,
            queue_size: DEFAULT_QUEUE_SIZE,
            throughput_interval_ms: DEFAULT_THROUGHPUT_INTERVAL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            transport: TransportType::UdpMulticast,
            local_delivery: true,
            masters_delivery: false,
            clients_delivery: false,
            local_group_id: DEFAULT_LOCAL_GROUP.to_string(),
            masters_group_id: DEFAULT_MASTERS_GROUP.to_string(),
            network: NetworkConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:7400".to_string(),
            clients_bind: "127.0.0.1:7401".to_string(),
            peers: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| NodeMonError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| NodeMonError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Reads `path` when it names an existing file, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var("NODEMON_NODE_ID") {
            self.node_id = Some(value);
        }
        if let Some(value) = env_parse::<usize>("NODEMON_MTU")? {
            self.mtu = value;
        }
        if let Some(value) = env_parse::<usize>("NODEMON_QUEUE_SIZE")? {
            self.queue_size = value;
        }
        if let Some(value) = env_parse::<u64>("NODEMON_THROUGHPUT_INTERVAL_MS")? {
            self.throughput_interval_ms = value;
        }
        if let Some(value) = env_parse::<bool>("NODEMON_LOCAL_DELIVERY")? {
            self.local_delivery = value;
        }
        if let Some(value) = env_parse::<bool>("NODEMON_MASTERS_DELIVERY")? {
            self.masters_delivery = value;
        }
        if let Some(value) = env_parse::<bool>("NODEMON_CLIENTS_DELIVERY")? {
            self.clients_delivery = value;
        }
        if let Ok(value) = std::env::var("NODEMON_LOCAL_GROUP") {
            self.local_group_id = value;
        }
        if let Ok(value) = std::env::var("NODEMON_MASTERS_GROUP") {
            self.masters_group_id = value;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mtu == 0 {
            return Err(NodeMonError::Config("mtu must be positive".to_string()));
        }
        if self.queue_size == 0 {
            return Err(NodeMonError::Config("queue_size must be positive".to_string()));
        }
        if self.local_group_id.trim().is_empty() || self.masters_group_id.trim().is_empty() {
            return Err(NodeMonError::Config("group ids must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn throughput_interval(&self) -> Duration {
        Duration::from_millis(self.throughput_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn local_lane_enabled(&self) -> bool {
        self.local_delivery && self.transport != TransportType::Tcp
    }

    pub fn masters_lane_enabled(&self) -> bool {
        self.masters_delivery
    }

    /// On for a TCP-oriented transport, or when forced by `clients_delivery`.
    pub fn clients_lane_enabled(&self) -> bool {
        self.transport == TransportType::Tcp || self.clients_delivery
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| NodeMonError::Config(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(None),
    }
}
