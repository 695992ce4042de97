//! # kaab-settings
//!
//! Layered configuration for the KaabHub realtime and assistant service.
//!
//! 1. **Compiled defaults**: [`KaabSettings::default()`]
//! 2. **Settings file**: `~/.kaab/settings.json` or an explicit path, deep-merged
//! 3. **Environment**: `KAAB_*` and `GEMINI_API_KEY` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
