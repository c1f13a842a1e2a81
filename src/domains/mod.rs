pub mod envelope;
pub mod node;
pub mod topology;

pub use envelope::{DataType, Envelope, MessageType, Payload, TransportType};
pub use node::{GroupInfo, NodeInfo, NodeRecord};
pub use topology::{Host, HostMap, Link, Topology};
