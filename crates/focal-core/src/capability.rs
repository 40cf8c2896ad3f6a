//! Outbound capability traits.
//!
//! These are the injection points for backends the engine depends on but
//! does not implement: token counting and (optionally) semantic similarity.

/// Injected token-counting capability: text in, token count out.
///
/// Implementations may call a real tokenizer or a remote service; the engine
/// wraps whichever is supplied in a bounded cache (see `focal-tokens`).
pub trait TokenCounter: Send + Sync {
    /// Count tokens in `text`, optionally tuned for a specific model.
    fn count(&self, text: &str, model_hint: Option<&str>) -> anyhow::Result<u64>;
}

/// Optional semantic-similarity capability.
///
/// No implementation ships with the engine; integrators that have a real
/// embedding backend can supply one to bias ranking. Absent a scorer the
/// engine ranks on access signals alone.
pub trait SemanticScorer: Send + Sync {
    /// Similarity of `text` to `query` in `[0.0, 1.0]`.
    fn similarity(&self, query: &str, text: &str) -> anyhow::Result<f64>;
}
