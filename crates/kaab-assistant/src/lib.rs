//! # kaab-assistant
//!
//! Answers free-text chat messages.
//!
//! A message is first matched against static bilingual keyword rules. Matches
//! are answered from live entity counts; everything else is delegated to a
//! generative model. Successful answers are memoized in a [`ResponseCache`]
//! keyed by a [`Fingerprint`] of the conversation tail, and concurrent
//! identical requests share one computation.

#![deny(unsafe_code)]

pub mod cache;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod history;
pub mod rules;
pub mod templates;

pub use cache::{CacheStats, CachedResponse, ResponseCache, spawn_sweeper};
pub use engine::{EngineConfig, ResponseEngine};
pub use errors::{EngineError, UpstreamCause};
pub use fingerprint::Fingerprint;
