//! # kaab-llm
//!
//! Generative model collaborator for the assistant.
//!
//! - [`provider`]: the [`GenerativeModel`] trait, request shape and [`ProviderError`]
//! - [`google`]: Gemini `generateContent` over HTTPS
//! - [`mock`]: scripted model for deterministic tests

#![deny(unsafe_code)]

pub mod google;
pub mod mock;
pub mod provider;

pub use provider::{
    GenerationParams, GenerationRequest, GenerativeModel, ModelRole, ModelTurn, ProviderError,
    ProviderResult,
};
