//! # kaab-hub
//!
//! Server binary: loads settings, wires the stores, model, response engine
//! and realtime server together, and runs until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kaab_assistant::{EngineConfig, ResponseCache, ResponseEngine, spawn_sweeper};
use kaab_core::memory::{MemoryEntityStore, MemoryNotificationStore};
use kaab_llm::GenerativeModel;
use kaab_llm::google::{GeminiConfig, GeminiProvider};
use kaab_server::{KaabServer, ServerConfig, ShutdownCoordinator};
use kaab_settings::KaabSettings;

/// KaabHub realtime and assistant server.
#[derive(Parser, Debug)]
#[command(name = "kaab-hub", about = "KaabHub realtime and assistant server")]
struct Cli {
    /// Settings file (defaults to `~/.kaab/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// JSON file seeding the entity store, shaped `{"post": [{"category": "x"}]}`.
    #[arg(long)]
    seed: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<KaabSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(kaab_settings::settings_path);
        let mut settings = kaab_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

fn entity_store(seed: Option<&Path>) -> Result<MemoryEntityStore> {
    let Some(path) = seed else {
        return Ok(MemoryEntityStore::new());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    MemoryEntityStore::from_json(&json)
        .with_context(|| format!("Invalid seed file {}", path.display()))
}

fn generative_model(settings: &KaabSettings) -> Option<Arc<dyn GenerativeModel>> {
    let api_key = settings.gemini.api_key.as_deref().filter(|k| !k.is_empty())?;
    let config = GeminiConfig::new(api_key, settings.gemini.model.clone())
        .with_base_url(settings.gemini.base_url.clone());
    Some(Arc::new(GeminiProvider::new(config)))
}

fn engine_config(settings: &KaabSettings) -> EngineConfig {
    EngineConfig {
        site_name: settings.site.name.clone(),
        site_base_url: settings.site.base_url.clone(),
        model_timeout: settings.assistant.model_timeout(),
        duplicate_window: settings.assistant.duplicate_window(),
        ..EngineConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    kaab_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let metrics = match kaab_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let store = Arc::new(entity_store(args.seed.as_deref())?);
    let model = generative_model(&settings);
    if model.is_none() {
        tracing::warn!("no Gemini API key configured, open-ended questions will be refused");
    }

    let cache = Arc::new(ResponseCache::new(settings.assistant.cache_ttl()));
    let engine = Arc::new(ResponseEngine::new(
        Arc::clone(&cache),
        store,
        model,
        engine_config(&settings),
    ));

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let sweeper = spawn_sweeper(cache, settings.assistant.sweep_interval(), shutdown.token());

    let mut server = KaabServer::new(
        ServerConfig::from_settings(&settings.server),
        engine,
        Arc::new(MemoryNotificationStore::new()),
    )
    .with_shutdown(Arc::clone(&shutdown));
    if let Some(handle) = metrics {
        server = server.with_metrics(handle);
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("KaabHub listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    shutdown.drain(vec![handle, sweeper], None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn cli_defaults_are_empty() {
        let cli = Cli::parse_from(["kaab-hub"]);
        assert!(cli.config.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.seed.is_none());
    }

    #[test]
    fn cli_flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"host": "10.0.0.1", "port": 7000}}"#).unwrap();

        let cli = Cli::parse_from([
            "kaab-hub",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "9100",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.server.host, "10.0.0.1");
        assert_eq!(settings.server.port, 9100);
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        let cli = Cli::parse_from(["kaab-hub", "--config", path.to_str().unwrap()]);
        assert!(cli.load_settings().is_err());
    }

    #[test]
    fn seed_file_populates_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"{"post": [{"category": "design"}, {}]}"#).unwrap();
        assert!(entity_store(Some(&path)).is_ok());
        assert!(entity_store(Some(&dir.path().join("missing.json"))).is_err());
        assert!(entity_store(None).is_ok());
    }

    #[test]
    fn model_requires_non_empty_key() {
        let mut settings = KaabSettings::default();
        assert!(generative_model(&settings).is_none());
        settings.gemini.api_key = Some(String::new());
        assert!(generative_model(&settings).is_none());
        settings.gemini.api_key = Some("key".into());
        assert!(generative_model(&settings).is_some());
    }

    #[test]
    fn engine_config_follows_settings() {
        let mut settings = KaabSettings::default();
        settings.site.name = "Kaab".into();
        settings.assistant.model_timeout_ms = 2_500;
        let config = engine_config(&settings);
        assert_eq!(config.site_name, "Kaab");
        assert_eq!(config.model_timeout, Duration::from_millis(2_500));
        assert!((config.params.temperature - 0.7).abs() < f64::EPSILON);
    }
}
