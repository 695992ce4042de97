//! # kaab-core
//!
//! Shared vocabulary for the realtime and assistant crates.
//!
//! - [`ids`]: branded identifiers for users and live channels
//! - [`topics`]: room naming (the wire contract clients join by)
//! - [`events`]: inbound/outbound realtime envelopes
//! - [`messages`]: conversation turns submitted to the assistant
//! - [`traits`]: external collaborators (entity store, notification store)
//! - [`memory`]: in-memory collaborator implementations
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod memory;
pub mod messages;
pub mod topics;
pub mod traits;

pub use errors::CollaboratorError;
pub use ids::{ChannelId, UserId};
pub use topics::Topic;
