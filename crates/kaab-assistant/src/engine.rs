//! The conversational response engine.
//!
//! `respond` runs in this order: validate, fingerprint, cache lookup, join or
//! start the in-flight computation for that fingerprint, then classify and
//! answer. No internal lock is held across a store or model call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kaab_core::messages::{ChatTurn, Role};
use kaab_core::traits::EntityStore;
use kaab_llm::{GenerationParams, GenerationRequest, GenerativeModel, ModelTurn, ProviderError};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::cache::ResponseCache;
use crate::errors::EngineError;
use crate::fingerprint::Fingerprint;
use crate::history::{self, DEFAULT_DUPLICATE_WINDOW};
use crate::rules::{EntityAction, Intent, RULES};
use crate::templates::{self, Lang};

type Shared = Arc<OnceCell<Result<String, EngineError>>>;
type InFlightMap = Mutex<HashMap<Fingerprint, Pending>>;

struct Pending {
    cell: Shared,
    callers: usize,
}

/// One caller's stake in an in-flight computation.
///
/// Dropping the slot, whether the caller finished or was cancelled, releases
/// the entry once nobody else waits on it or the result is settled.
struct InFlightSlot<'a> {
    map: &'a InFlightMap,
    fingerprint: &'a Fingerprint,
    cell: Shared,
}

impl<'a> InFlightSlot<'a> {
    fn join(map: &'a InFlightMap, fingerprint: &'a Fingerprint) -> Self {
        let mut pending = map.lock();
        let entry = pending.entry(fingerprint.clone()).or_insert_with(|| Pending {
            cell: Arc::new(OnceCell::new()),
            callers: 0,
        });
        entry.callers += 1;
        Self {
            map,
            fingerprint,
            cell: Arc::clone(&entry.cell),
        }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut pending = self.map.lock();
        let Some(entry) = pending.get_mut(self.fingerprint) else {
            return;
        };
        if !Arc::ptr_eq(&entry.cell, &self.cell) {
            return;
        }
        entry.callers = entry.callers.saturating_sub(1);
        if entry.callers == 0 || self.cell.initialized() {
            let _ = pending.remove(self.fingerprint);
        }
    }
}

/// Engine tuning.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Product name used in answers and recognized as a platform keyword.
    pub site_name: String,
    /// Prefix for navigation links.
    pub site_base_url: String,
    /// Deadline for one model call.
    pub model_timeout: Duration,
    /// Window for collapsing resubmitted turns.
    pub duplicate_window: Duration,
    /// Sampling parameters sent to the model.
    pub params: GenerationParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            site_name: "KaabHub".to_string(),
            site_base_url: String::new(),
            model_timeout: Duration::from_secs(10),
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
            params: GenerationParams::default(),
        }
    }
}

impl EngineConfig {
    fn system_instruction(&self) -> String {
        format!(
            "You are the assistant of {site}, a platform where students find scholarships, \
             internships, mentors and a community to ask questions. Answer helpfully and \
             concisely, in the same language the user writes in. If a question is unrelated \
             to studying or careers, answer briefly and steer back to how {site} can help.",
            site = self.site_name
        )
    }
}

/// Answers conversation histories.
pub struct ResponseEngine {
    cache: Arc<ResponseCache>,
    store: Arc<dyn EntityStore>,
    model: Option<Arc<dyn GenerativeModel>>,
    config: EngineConfig,
    in_flight: InFlightMap,
}

impl ResponseEngine {
    /// Create an engine. `model` is `None` when no credential is configured.
    pub fn new(
        cache: Arc<ResponseCache>,
        store: Arc<dyn EntityStore>,
        model: Option<Arc<dyn GenerativeModel>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            cache,
            store,
            model,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The cache this engine writes to.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Produce a reply to the last user turn of `history`.
    #[instrument(skip_all, fields(turns = history.len()))]
    pub async fn respond(&self, history: &[ChatTurn]) -> Result<String, EngineError> {
        let last = validate(history)?;
        let fingerprint = Fingerprint::of(&last.text, history.len());

        if let Some(hit) = self.cache.get(&fingerprint) {
            debug!(fingerprint = fingerprint.short(), "cache hit");
            return Ok(hit.text);
        }

        let slot = InFlightSlot::join(&self.in_flight, &fingerprint);
        let result = slot
            .cell
            .get_or_init(|| self.compute(&fingerprint, history, &last.text))
            .await
            .clone();
        drop(slot);
        result
    }

    /// Requests currently being computed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn compute(
        &self,
        fingerprint: &Fingerprint,
        history: &[ChatTurn],
        text: &str,
    ) -> Result<String, EngineError> {
        // Another caller may have finished between our lookup and joining.
        if let Some(hit) = self.cache.get(fingerprint) {
            return Ok(hit.text);
        }

        let turns = history::dedupe(history, self.config.duplicate_window);
        let lang = Lang::detect(text);

        match RULES.classify(text, &self.config.site_name) {
            Intent::About => {
                debug!(fingerprint = fingerprint.short(), "about intent");
                Ok(templates::about(&self.config.site_name, lang))
            }
            Intent::Entity { rule, action } => {
                debug!(
                    fingerprint = fingerprint.short(),
                    kind = %rule.kind,
                    ?action,
                    "entity intent"
                );
                let records = self.store.find_all(rule.kind).await.map_err(|e| {
                    warn!(kind = %rule.kind, error = %e, "entity store query failed");
                    EngineError::from(e)
                })?;
                let link = templates::link(&self.config.site_base_url, rule.slug);
                let answer = match action {
                    EntityAction::Count => templates::count(rule.kind, records.len(), &link, lang),
                    EntityAction::ListCategories => {
                        let tags = templates::distinct_categories(&records);
                        templates::categories(rule.kind, &tags, &link, lang)
                    }
                    EntityAction::Browse => templates::browse(rule.kind, &link, lang),
                };
                self.cache.put(fingerprint.clone(), answer.clone());
                Ok(answer)
            }
            Intent::Delegate => {
                let answer = self.delegate(&turns).await?;
                self.cache.put(fingerprint.clone(), answer.clone());
                Ok(answer)
            }
        }
    }

    async fn delegate(&self, turns: &[ChatTurn]) -> Result<String, EngineError> {
        let Some(model) = self.model.as_ref() else {
            return Err(EngineError::Configuration(
                "generative model API key is not configured".into(),
            ));
        };

        let request = self.build_request(turns);
        let timeout = self.config.model_timeout;
        metrics::counter!("assistant_model_calls_total", "model" => model.model().to_string())
            .increment(1);
        let started = tokio::time::Instant::now();

        let outcome = tokio::time::timeout(timeout, model.generate(&request)).await;
        metrics::histogram!("assistant_model_call_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(text)) => {
                info!(model = model.model(), chars = text.len(), "model answered");
                Ok(text)
            }
            Ok(Err(e)) => {
                warn!(model = model.model(), category = e.category(), error = %e, "model call failed");
                Err(e.into())
            }
            Err(_) => {
                let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(model = model.model(), after_ms, "model call timed out");
                Err(ProviderError::Timeout { after_ms }.into())
            }
        }
    }

    fn build_request(&self, turns: &[ChatTurn]) -> GenerationRequest {
        let mut out = Vec::with_capacity(turns.len() + 1);
        out.push(ModelTurn::user(self.config.system_instruction()));
        out.extend(turns.iter().map(|turn| match turn.role {
            Role::Assistant => ModelTurn::model(turn.text.clone()),
            Role::User | Role::Other(_) => ModelTurn::user(turn.text.clone()),
        }));
        GenerationRequest {
            turns: out,
            params: self.config.params,
        }
    }
}

fn validate(history: &[ChatTurn]) -> Result<&ChatTurn, EngineError> {
    let Some(last) = history.last() else {
        return Err(EngineError::Input("conversation history is empty".into()));
    };
    if !last.is_user() {
        return Err(EngineError::Input(
            "last message must come from the user".into(),
        ));
    }
    if last.text.trim().is_empty() {
        return Err(EngineError::Input("last message is empty".into()));
    }
    Ok(last)
}
