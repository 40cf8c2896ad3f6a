//! Bounded token estimation cache.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use focal_core::config::TokenConfig;
use focal_core::{ResourceType, TokenCounter};

/// Number of leading characters of the text used in the cache key.
const KEY_PREFIX_CHARS: usize = 64;

/// Width of the length buckets used in the cache key.
const LENGTH_BUCKET: usize = 64;

/// Errors from token estimation.
///
/// An estimation failure excludes a single resource from the current
/// prioritization run; it never aborts the run.
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("size unavailable for resource: {0}")]
    SizeUnavailable(String),

    #[error("token counter failed: {0}")]
    Counter(String),
}

pub type Result<T> = std::result::Result<T, EstimationError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    model_hint: Option<String>,
    length_bucket: usize,
    prefix: String,
}

impl CacheKey {
    fn new(text: &str, model_hint: Option<&str>) -> Self {
        Self {
            model_hint: model_hint.map(str::to_string),
            length_bucket: text.len() / LENGTH_BUCKET,
            prefix: text.chars().take(KEY_PREFIX_CHARS).collect(),
        }
    }
}

/// FIFO-evicting bounded map. Oldest-inserted entries leave first.
struct BoundedCache {
    entries: HashMap<CacheKey, u64>,
    insertion_order: VecDeque<CacheKey>,
    capacity: usize,
}

impl BoundedCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, key: &CacheKey) -> Option<u64> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: CacheKey, value: u64) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }

        while self.entries.len() >= self.capacity {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }

        self.insertion_order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Token estimator wrapping an injected counter with a bounded cache.
pub struct TokenEstimator {
    counter: Arc<dyn TokenCounter>,
    cache: Mutex<BoundedCache>,
    config: TokenConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TokenEstimator {
    /// Create an estimator over the given counter.
    ///
    /// A zero capacity in the config is clamped to 1; the cache is always
    /// bounded and always present.
    pub fn new(counter: Arc<dyn TokenCounter>, config: TokenConfig) -> Self {
        let capacity = config.cache_capacity.max(1);
        Self {
            counter,
            cache: Mutex::new(BoundedCache::new(capacity)),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Count tokens in `text`, consulting the cache first.
    pub fn count_tokens(&self, text: &str, model_hint: Option<&str>) -> Result<u64> {
        let key = CacheKey::new(text, model_hint);

        if let Some(cached) = self.cache.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }

        let count = self
            .counter
            .count(text, model_hint)
            .map_err(|e| EstimationError::Counter(e.to_string()))?;

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.cache.lock().insert(key, count);
        Ok(count)
    }

    /// Estimate token cost from size and resource type.
    ///
    /// Used when the resource's full text is not cheaply available: tokens
    /// are approximated as `ceil(size_bytes / bytes_per_token)` with the
    /// ratio keyed by resource type. A missing size is an
    /// [`EstimationError::SizeUnavailable`]; callers treat the resource as
    /// "exclude from budget consideration" rather than aborting.
    pub fn estimate_resource_tokens(
        &self,
        path: &str,
        resource_type: ResourceType,
        size_bytes: Option<u64>,
    ) -> Result<u64> {
        let size = size_bytes.ok_or_else(|| EstimationError::SizeUnavailable(path.to_string()))?;
        let ratio = self.bytes_per_token(resource_type);
        let tokens = (size as f64 / ratio).ceil() as u64;
        debug!(path, size, tokens, "estimated resource tokens");
        Ok(tokens)
    }

    /// Bytes-per-token ratio for a resource type.
    pub fn bytes_per_token(&self, resource_type: ResourceType) -> f64 {
        match resource_type {
            ResourceType::Code => self.config.code_bytes_per_token,
            ResourceType::Documentation => self.config.documentation_bytes_per_token,
            ResourceType::Data => self.config.data_bytes_per_token,
            ResourceType::Research | ResourceType::Generated => {
                self.config.default_bytes_per_token
            }
        }
    }

    /// Cache hit/miss counters, for diagnostics.
    pub fn cache_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Number of cached entries.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Characters-per-token heuristic counter.
///
/// A crude but serviceable default: roughly four characters per token.
pub struct HeuristicCounter {
    chars_per_token: f64,
}

impl HeuristicCounter {
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0,
        }
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str, _model_hint: Option<&str>) -> anyhow::Result<u64> {
        let chars = text.chars().count() as f64;
        Ok((chars / self.chars_per_token).ceil() as u64)
    }
}
