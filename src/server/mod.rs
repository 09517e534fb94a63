//! Viewer-facing server and coordination

pub mod config;
pub mod coordinator;
pub mod message;

pub use config::{ServerConfig, DEFAULT_PLAYER_COUNT};
pub use coordinator::Server;
pub use message::{Action, ClientRequest};
