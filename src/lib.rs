pub mod config;
pub mod daemon;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod node;
pub mod providers;
pub mod services;

pub use crate::config::Config;
pub use crate::domains::{Envelope, MessageType, Payload, TransportType};
pub use crate::error::{NodeMonError, Result};
pub use crate::node::NodeMon;
