pub mod listener;
pub mod messenger;
pub mod scheduler;
pub mod world_state;
