pub mod client_server;
pub mod fragment;
pub mod proxy;
pub mod queue;
pub mod scheduler;
pub mod throughput;
pub mod transport;
