//! TTL cache for assistant responses.
//!
//! Expiry is enforced twice: `get` drops an expired entry it finds, and a
//! periodic sweep removes every expired entry whether or not it is read
//! again. There is no size bound; memory is bounded by TTL and traffic.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::fingerprint::Fingerprint;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default sweep period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A cached answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedResponse {
    /// Response text.
    pub text: String,
    /// When it was stored.
    pub created_at: Instant,
}

/// Response cache keyed by [`Fingerprint`].
pub struct ResponseCache {
    entries: Mutex<HashMap<Fingerprint, CachedResponse>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time cache statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored, expired or not.
    pub size: usize,
    /// Lookups that returned an entry.
    pub hits: u64,
    /// Lookups that found nothing live.
    pub misses: u64,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResponseCache {
    /// Empty cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live entry for `key`. An expired entry is removed and reported absent.
    pub fn get(&self, key: &Fingerprint) -> Option<CachedResponse> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let found = match entries.get(key) {
            Some(entry) if self.is_expired(entry, now) => {
                let _ = entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        };
        drop(entries);

        if found.is_some() {
            let _ = self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("assistant_cache_lookups_total", "result" => "hit").increment(1);
        } else {
            let _ = self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("assistant_cache_lookups_total", "result" => "miss").increment(1);
        }
        found
    }

    /// Store `text` under `key`, replacing any previous entry.
    pub fn put(&self, key: Fingerprint, text: impl Into<String>) {
        let entry = CachedResponse {
            text: text.into(),
            created_at: Instant::now(),
        };
        let _ = self.entries.lock().insert(key, entry);
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Entries currently stored, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn is_expired(&self, entry: &CachedResponse, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) >= self.ttl
    }
}

/// Run [`ResponseCache::sweep`] every `period` until `cancel` fires.
pub fn spawn_sweeper(
    cache: Arc<ResponseCache>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = cache.len(), "response cache swept");
                    }
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!("assistant_cache_entries").set(cache.len() as f64);
                }
            }
        }
        info!("response cache sweeper stopped");
    })
}
