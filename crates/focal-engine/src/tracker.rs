//! In-memory resource access tracking and importance scoring.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::trace;

use focal_core::{
    normalize_path, AccessEvent, AccessMetadata, AccessType, ResourceStats, ResourceType, Result,
};

/// Single internal subscriber notified of each access event.
///
/// This is deliberately not a broadcast bus; one coordinator owns one
/// tracker.
pub type AccessObserver = Box<dyn Fn(&AccessEvent) + Send + Sync>;

/// Derived importance of a resource at a point in time.
///
/// The formula sums four signals:
/// - recency: `40 - hours_since_last_access`, hours clamped to `[0, 40]`
/// - frequency: `min(access_count, 15) * 2` (cap 30)
/// - access types: `+10` if edited, `+5` if executed, `+3` if referenced
/// - modification: `+15` if the resource was ever modified
///
/// The total is intentionally unclamped (0-103 in principle); clamping to a
/// display range would silently change relative ordering.
pub fn importance_at(stats: &ResourceStats, now: DateTime<Utc>) -> f64 {
    let hours = (now - stats.last_accessed).num_milliseconds() as f64 / 3_600_000.0;
    let recency = 40.0 - hours.clamp(0.0, 40.0);

    let frequency = (stats.access_count.min(15) * 2) as f64;

    let mut access = 0.0;
    if stats.access_types_seen.contains(&AccessType::Edit) {
        access += 10.0;
    }
    if stats.access_types_seen.contains(&AccessType::Execute) {
        access += 5.0;
    }
    if stats.access_types_seen.contains(&AccessType::Reference) {
        access += 3.0;
    }

    let modification = if stats.modified { 15.0 } else { 0.0 };

    recency + frequency + access + modification
}

/// In-memory authoritative state of per-resource access statistics.
///
/// Scoped to one session's lifetime; pure computation, no I/O. The owning
/// coordinator confines it behind a mutex.
pub struct ResourceTracker {
    session_id: String,
    resources: HashMap<String, ResourceStats>,
    observer: Option<AccessObserver>,
}

impl ResourceTracker {
    /// Create a tracker for a session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            resources: HashMap::new(),
            observer: None,
        }
    }

    /// Record an access: creates stats on first sight, increments the
    /// access count, bumps `last_accessed`, unions the access type, applies
    /// sticky modification, and overwrites the size when provided.
    ///
    /// Notifies the registered observer and returns the event.
    pub fn track_access(
        &mut self,
        path: &str,
        resource_type: ResourceType,
        access_type: AccessType,
        metadata: AccessMetadata,
    ) -> Result<AccessEvent> {
        let normalized = normalize_path(path)?;
        let now = Utc::now();

        let stats = self
            .resources
            .entry(normalized.clone())
            .or_insert_with(|| ResourceStats {
                path: normalized.clone(),
                resource_type,
                size_bytes: None,
                access_count: 0,
                last_accessed: now,
                access_types_seen: HashSet::new(),
                modified: false,
            });

        stats.access_count += 1;
        stats.last_accessed = now;
        stats.access_types_seen.insert(access_type);
        stats.resource_type = resource_type;
        if let Some(size) = metadata.size_bytes {
            stats.size_bytes = Some(size);
        }
        if metadata.modified {
            stats.modified = true;
        }

        trace!(path = %normalized, count = stats.access_count, "tracked access");

        let event = AccessEvent {
            session_id: self.session_id.clone(),
            path: normalized,
            resource_type,
            access_type,
            timestamp: now,
            metadata,
        };

        if let Some(observer) = &self.observer {
            observer(&event);
        }

        Ok(event)
    }

    /// Current importance of a path, or `None` if untracked.
    pub fn importance_score(&self, path: &str) -> Option<f64> {
        let normalized = normalize_path(path).ok()?;
        self.resources
            .get(&normalized)
            .map(|s| importance_at(s, Utc::now()))
    }

    /// All tracked paths with scores, importance descending.
    ///
    /// Ties break by most-recent `last_accessed`, then by path ascending,
    /// so the ranking is deterministic. One `now` snapshot scores the whole
    /// ranking.
    pub fn ranked_with_scores(&self, now: DateTime<Utc>) -> Vec<(String, f64)> {
        let mut scored: Vec<(&ResourceStats, f64)> = self
            .resources
            .values()
            .map(|s| (s, importance_at(s, now)))
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_accessed.cmp(&a.last_accessed))
                .then_with(|| a.path.cmp(&b.path))
        });

        scored
            .into_iter()
            .map(|(s, score)| (s.path.clone(), score))
            .collect()
    }

    /// All tracked paths sorted by importance descending.
    pub fn ranked_paths(&self) -> Vec<String> {
        self.ranked_with_scores(Utc::now())
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    }

    /// Statistics for a path, if tracked.
    pub fn stats(&self, path: &str) -> Option<&ResourceStats> {
        let normalized = normalize_path(path).ok()?;
        self.resources.get(&normalized)
    }

    /// Remove a resource from tracking. Returns whether it was present.
    pub fn remove(&mut self, path: &str) -> bool {
        match normalize_path(path) {
            Ok(normalized) => self.resources.remove(&normalized).is_some(),
            Err(_) => false,
        }
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether any resource is tracked.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Session this tracker belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Register the single internal subscriber.
    pub fn set_observer(&mut self, observer: AccessObserver) {
        self.observer = Some(observer);
    }

    /// Unregister the subscriber.
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn stats(path: &str, count: u64, last: DateTime<Utc>) -> ResourceStats {
        ResourceStats {
            path: path.to_string(),
            resource_type: ResourceType::Code,
            size_bytes: None,
            access_count: count,
            last_accessed: last,
            access_types_seen: HashSet::new(),
            modified: false,
        }
    }

    #[test]
    fn test_access_count_equals_calls() {
        let mut tracker = ResourceTracker::new("s1");
        for _ in 0..5 {
            tracker
                .track_access("/a.rs", ResourceType::Code, AccessType::View, AccessMetadata::default())
                .unwrap();
        }
        assert_eq!(tracker.stats("/a.rs").unwrap().access_count, 5);
    }

    #[test]
    fn test_equivalent_paths_collapse() {
        let mut tracker = ResourceTracker::new("s1");
        tracker
            .track_access("/a/b.ts", ResourceType::Code, AccessType::View, AccessMetadata::default())
            .unwrap();
        tracker
            .track_access("/a/./b.ts", ResourceType::Code, AccessType::View, AccessMetadata::default())
            .unwrap();

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.stats("/a/b.ts").unwrap().access_count, 2);
    }

    #[test]
    fn test_modified_is_sticky() {
        let mut tracker = ResourceTracker::new("s1");
        tracker
            .track_access("/a.rs", ResourceType::Code, AccessType::Edit, AccessMetadata::modifying())
            .unwrap();
        tracker
            .track_access("/a.rs", ResourceType::Code, AccessType::View, AccessMetadata::default())
            .unwrap();

        assert!(tracker.stats("/a.rs").unwrap().modified);
    }

    #[test]
    fn test_size_overwritten_only_when_provided() {
        let mut tracker = ResourceTracker::new("s1");
        tracker
            .track_access("/a.rs", ResourceType::Code, AccessType::View, AccessMetadata::with_size(100))
            .unwrap();
        tracker
            .track_access("/a.rs", ResourceType::Code, AccessType::View, AccessMetadata::default())
            .unwrap();

        assert_eq!(tracker.stats("/a.rs").unwrap().size_bytes, Some(100));
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut tracker = ResourceTracker::new("s1");
        let result =
            tracker.track_access("  ", ResourceType::Code, AccessType::View, AccessMetadata::default());
        assert!(result.is_err());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_score_increases_with_access_count() {
        let now = Utc::now();
        let low = importance_at(&stats("/x", 2, now), now);
        let high = importance_at(&stats("/x", 10, now), now);
        assert!(high > low);

        // Frequency caps at 15 accesses.
        let capped = importance_at(&stats("/x", 15, now), now);
        let beyond = importance_at(&stats("/x", 50, now), now);
        assert_eq!(capped, beyond);
    }

    #[test]
    fn test_score_decreases_with_staleness() {
        let now = Utc::now();
        let fresh = importance_at(&stats("/x", 1, now), now);
        let stale = importance_at(&stats("/x", 1, now - Duration::hours(10)), now);
        let ancient = importance_at(&stats("/x", 1, now - Duration::hours(100)), now);

        assert!(fresh > stale);
        assert!(stale > ancient);
        // Recency bottoms out at 40 hours.
        let very_ancient = importance_at(&stats("/x", 1, now - Duration::hours(500)), now);
        assert_eq!(ancient, very_ancient);
    }

    #[test]
    fn test_access_type_and_modification_bonuses() {
        let now = Utc::now();
        let mut s = stats("/x", 1, now);
        let base = importance_at(&s, now);

        s.access_types_seen.insert(AccessType::Edit);
        s.access_types_seen.insert(AccessType::Execute);
        s.access_types_seen.insert(AccessType::Reference);
        assert_eq!(importance_at(&s, now), base + 18.0);

        s.modified = true;
        assert_eq!(importance_at(&s, now), base + 33.0);
    }

    #[test]
    fn test_score_can_exceed_one_hundred() {
        let now = Utc::now();
        let mut s = stats("/x", 15, now);
        s.access_types_seen.insert(AccessType::Edit);
        s.access_types_seen.insert(AccessType::Execute);
        s.access_types_seen.insert(AccessType::Reference);
        s.modified = true;
        // 40 + 30 + 18 + 15
        assert_eq!(importance_at(&s, now), 103.0);
    }

    #[test]
    fn test_tie_break_recent_access_then_path() {
        let now = Utc::now();

        // Equal score, different recency: most recent first. Two hours of
        // staleness trade exactly against one access step of frequency:
        // old = (40 - 2) + 6 = 44, new = (40 - 0) + 4 = 44.
        let mut tracker = ResourceTracker::new("s1");
        tracker
            .resources
            .insert("/old.rs".into(), stats("/old.rs", 3, now - Duration::hours(2)));
        tracker.resources.insert("/new.rs".into(), stats("/new.rs", 2, now));
        let ranked = tracker.ranked_with_scores(now);
        assert_eq!(ranked[0].1, ranked[1].1);
        assert_eq!(ranked[0].0, "/new.rs");

        // Fully identical signals: path ascending decides.
        let mut tracker = ResourceTracker::new("s1");
        tracker.resources.insert("/b.rs".into(), stats("/b.rs", 3, now));
        tracker.resources.insert("/a.rs".into(), stats("/a.rs", 3, now));
        let ranked = tracker.ranked_with_scores(now);
        assert_eq!(ranked[0].1, ranked[1].1);
        assert_eq!(ranked[0].0, "/a.rs");
    }

    #[test]
    fn test_observer_notified_per_access() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let mut tracker = ResourceTracker::new("s1");
        tracker.set_observer(Box::new(move |event| {
            assert_eq!(event.session_id, "s1");
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        for _ in 0..3 {
            tracker
                .track_access("/a.rs", ResourceType::Code, AccessType::View, AccessMetadata::default())
                .unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        tracker.clear_observer();
        tracker
            .track_access("/a.rs", ResourceType::Code, AccessType::View, AccessMetadata::default())
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_remove() {
        let mut tracker = ResourceTracker::new("s1");
        tracker
            .track_access("/a.rs", ResourceType::Code, AccessType::View, AccessMetadata::default())
            .unwrap();

        assert!(tracker.remove("/a.rs"));
        assert!(!tracker.remove("/a.rs"));
        assert!(tracker.is_empty());
    }
}
