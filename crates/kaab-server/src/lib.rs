//! # kaab-server
//!
//! Axum HTTP + WebSocket surface of the hub.
//!
//! - [`realtime`]: presence registry, room broker, event dispatcher, sessions
//! - [`http`]: chatbot endpoint and the persistent store's publish hooks
//! - [`server`]: router assembly and the listener
//! - [`shutdown`]: cancellation shared by every background task

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod http;
pub mod metrics;
pub mod realtime;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use server::{AppState, KaabServer};
pub use shutdown::ShutdownCoordinator;
