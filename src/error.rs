use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeMonError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("world state error: {0}")]
    WorldState(String),
    #[error("unknown client: {0}")]
    UnknownClient(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, NodeMonError>;
