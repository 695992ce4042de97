//! Settings loading with deep merge and environment overrides.
//!
//! Layers, lowest priority first:
//! 1. [`KaabSettings::default()`]
//! 2. The JSON settings file, deep-merged over the defaults
//! 3. Environment variables
//!
//! Merge rules: objects merge per key, arrays and primitives are replaced,
//! nulls in the file are skipped.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::KaabSettings;

/// Default settings file location (`~/.kaab/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".kaab").join("settings.json")
}

/// Load from the default path and the process environment.
pub fn load_settings() -> Result<KaabSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path` and the process environment.
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<KaabSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<KaabSettings> {
    let defaults = serde_json::to_value(KaabSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut KaabSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values that fail strict parsing are logged and ignored, leaving the
/// file or default value in place.
pub fn apply_overrides(settings: &mut KaabSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    if let Some(v) = env.string("KAAB_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("KAAB_PORT", 1, 65535) {
        settings.server.port = v;
    }

    if let Some(v) = env.u64("KAAB_CACHE_TTL_SECS", 1, 86_400) {
        settings.assistant.cache_ttl_secs = v;
    }
    if let Some(v) = env.u64("KAAB_SWEEP_INTERVAL_SECS", 1, 86_400) {
        settings.assistant.sweep_interval_secs = v;
    }
    if let Some(v) = env.u64("KAAB_MODEL_TIMEOUT_MS", 100, 600_000) {
        settings.assistant.model_timeout_ms = v;
    }

    if let Some(v) = env.string("KAAB_GEMINI_MODEL") {
        settings.gemini.model = v;
    }
    if let Some(v) = env.string("KAAB_GEMINI_BASE_URL") {
        settings.gemini.base_url = v;
    }
    if let Some(v) = env.string("GEMINI_API_KEY") {
        settings.gemini.api_key = Some(v);
    }

    if let Some(v) = env.string("KAAB_SITE_BASE_URL") {
        settings.site.base_url = v;
    }

    if let Some(v) = env.string("KAAB_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("KAAB_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsers ────────────────────────────────────────────────────────────

/// Parse a boolean: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u16` within `[min, max]`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a `u64` within `[min, max]`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}
