use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::domains::node::{GroupInfo, NodeInfo};
use crate::domains::topology::{Link, Topology};
use crate::error::{NodeMonError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    UpdateData,
    UpdateWorldState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportType {
    UdpUnicast,
    UdpMulticast,
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Link,
    Topology,
    Group,
    Info,
    Empty,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Link => "LINK",
            DataType::Topology => "TOPOLOGY",
            DataType::Group => "GROUP",
            DataType::Info => "INFO",
            DataType::Empty => "EMPTY",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data_type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    Link(Vec<Link>),
    Topology(Topology),
    Group(GroupInfo),
    Info(NodeInfo),
    Empty,
}

impl Payload {
    pub fn data_type(&self) -> DataType {
        match self {
            Payload::Link(_) => DataType::Link,
            Payload::Topology(_) => DataType::Topology,
            Payload::Group(_) => DataType::Group,
            Payload::Info(_) => DataType::Info,
            Payload::Empty => DataType::Empty,
        }
    }
}

/// The routable unit exchanged between nodes and handed to local clients.
///
/// An `Envelope` is never edited in place. Routing changes go through the
/// consuming `with_*` methods or [`Envelope::repack`], which build a new value
/// and leave the payload untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    message_type: MessageType,
    transport_type: TransportType,
    sender_id: String,
    recipient_id: String,
    data_node_id: String,
    timestamp: i64,
    payload: Payload,
}

impl Envelope {
    /// Builds an `UPDATE_DATA` envelope describing `data_node_id`, sent by `sender_id`.
    pub fn new(sender_id: impl Into<String>, data_node_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            message_type: MessageType::UpdateData,
            transport_type: TransportType::UdpMulticast,
            sender_id: sender_id.into(),
            recipient_id: String::new(),
            data_node_id: data_node_id.into(),
            timestamp: now_ms(),
            payload,
        }
    }

    /// Builds the request that makes the proxy push a full snapshot to one client.
    pub fn world_state_request(sender_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        let sender_id = sender_id.into();
        Self {
            message_type: MessageType::UpdateWorldState,
            transport_type: TransportType::Tcp,
            recipient_id: client_id.into(),
            data_node_id: sender_id.clone(),
            sender_id,
            timestamp: now_ms(),
            payload: Payload::Empty,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    pub fn data_node_id(&self) -> &str {
        &self.data_node_id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn data_type(&self) -> DataType {
        self.payload.data_type()
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn with_message_type(self, message_type: MessageType) -> Self {
        Self {
            message_type,
            ..self
        }
    }

    pub fn with_transport(self, transport_type: TransportType) -> Self {
        Self {
            transport_type,
            ..self
        }
    }

    pub fn with_sender(self, sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            ..self
        }
    }

    pub fn with_recipient(self, recipient_id: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            ..self
        }
    }

    /// Same routing and timestamp, different payload. Used for fragments.
    pub fn with_payload(&self, payload: Payload) -> Self {
        Self {
            message_type: self.message_type,
            transport_type: self.transport_type,
            sender_id: self.sender_id.clone(),
            recipient_id: self.recipient_id.clone(),
            data_node_id: self.data_node_id.clone(),
            timestamp: self.timestamp,
            payload,
        }
    }

    /// Copy carrying new routing fields for one delivery lane.
    pub fn repack(
        &self,
        message_type: MessageType,
        sender_id: &str,
        recipient_id: &str,
        transport_type: TransportType,
    ) -> Self {
        self.clone()
            .with_message_type(message_type)
            .with_sender(sender_id)
            .with_recipient(recipient_id)
            .with_transport(transport_type)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| NodeMonError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| NodeMonError::Serialization(e.to_string()))
    }

    pub fn serialized_size(&self) -> Result<usize> {
        encoded_len(self)
    }
}

pub fn encoded_len<T: Serialize + ?Sized>(value: &T) -> Result<usize> {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .map_err(|e| NodeMonError::Serialization(e.to_string()))
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
