//! Session prioritization coordinator.
//!
//! Owns a session's lifecycle: subscribes to tracker events, drives
//! asynchronous persistence through the store gateway, and exposes the
//! budget-constrained selection operation and the metrics report. The
//! pending-operations barrier guarantees that selection never reads state
//! whose writes were still in flight when the run began.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use focal_core::{AccessMetadata, AccessType, Config, Error as CoreError, ResourceType};
use focal_store::{ResourceStore, StoreError};
use focal_tokens::TokenEstimator;

use crate::report;
use crate::tracker::ResourceTracker;

/// Errors surfaced by coordinator operations.
///
/// Persistence failures on background tasks are not here; they land in the
/// diagnostics buffer (see [`PrioritizationCoordinator::take_persistence_errors`]).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// A persistence failure recorded from a background task.
#[derive(Debug, Clone)]
pub struct PersistenceFailure {
    /// Gateway operation that failed
    pub operation: &'static str,
    /// Resource path involved
    pub path: String,
    /// Error description
    pub error: String,
    /// When the failure was recorded
    pub at: DateTime<Utc>,
}

type FailureLog = Arc<Mutex<VecDeque<PersistenceFailure>>>;

fn record_failure(
    failures: &FailureLog,
    cap: usize,
    operation: &'static str,
    path: &str,
    error: &dyn std::fmt::Display,
) {
    warn!(operation, path, "persistence failed: {error}");
    let mut log = failures.lock();
    log.push_back(PersistenceFailure {
        operation,
        path: path.to_string(),
        error: error.to_string(),
        at: Utc::now(),
    });
    while log.len() > cap {
        log.pop_front();
    }
}

/// Arena of in-flight persistence tasks.
///
/// Each spawned write is keyed by an opaque id; settled entries are reaped
/// as new work arrives. A barrier drains and awaits the snapshot taken at
/// entry - operations started afterwards are not waited on, which keeps the
/// wait bounded under constant new traffic.
struct PendingOps {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl PendingOps {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn track<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(fut);
        let mut tasks = self.tasks.lock();
        tasks.retain(|_, h| !h.is_finished());
        tasks.insert(id, handle);
    }

    /// Await the current snapshot of in-flight tasks, bounded by `timeout`.
    ///
    /// On timeout the remaining tasks are detached, not cancelled: the
    /// writes still complete eventually, the caller just stops waiting.
    async fn barrier(&self, timeout: Duration) {
        let snapshot: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain().map(|(_, handle)| handle).collect()
        };
        if snapshot.is_empty() {
            return;
        }

        let count = snapshot.len();
        debug!(pending = count, "awaiting pending persistence operations");

        let wait = async move {
            for handle in snapshot {
                if let Err(e) = handle.await {
                    warn!("persistence task panicked: {e}");
                }
            }
        };

        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!(
                pending = count,
                timeout_ms = timeout.as_millis() as u64,
                "pending-operation barrier timed out; proceeding"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Prioritizing,
    Disposed,
}

/// Result of a prioritization run.
#[derive(Debug, Clone)]
pub struct Prioritization {
    /// Selected paths, in acceptance (importance) order
    pub included: Vec<String>,
    /// Sum of estimated token costs of the selection; always <= the budget
    pub total_tokens: u64,
    /// Number of resources evaluated
    pub evaluated: usize,
    /// Paths excluded because their token cost could not be estimated
    pub skipped: Vec<String>,
}

impl Prioritization {
    /// True when at least one resource was dropped for estimation failure,
    /// making this run degraded rather than clean.
    pub fn is_degraded(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Coordinates tracking, persistence, and budget-constrained selection for
/// one session.
pub struct PrioritizationCoordinator {
    session_id: String,
    store: Arc<dyn ResourceStore>,
    estimator: Arc<TokenEstimator>,
    tracker: Arc<Mutex<ResourceTracker>>,
    pending: Arc<PendingOps>,
    resource_ids: Arc<Mutex<HashMap<String, i64>>>,
    failures: FailureLog,
    state: Mutex<State>,
    /// Serializes prioritization runs so two runs never double-count the
    /// same budget.
    prioritize_lock: tokio::sync::Mutex<()>,
    barrier_timeout: Duration,
    max_recorded_errors: usize,
}

impl PrioritizationCoordinator {
    /// Create a coordinator, registering a new session with the store.
    pub async fn new(
        store: Arc<dyn ResourceStore>,
        estimator: Arc<TokenEstimator>,
        config: Config,
        token_budget: u64,
        summary: &str,
    ) -> Result<Self> {
        Self::with_parent(store, estimator, config, token_budget, summary, None).await
    }

    /// Create a coordinator for a session continued from `parent_session`.
    pub async fn with_parent(
        store: Arc<dyn ResourceStore>,
        estimator: Arc<TokenEstimator>,
        config: Config,
        token_budget: u64,
        summary: &str,
        parent_session: Option<&str>,
    ) -> Result<Self> {
        if token_budget == 0 {
            return Err(CoreError::InvalidBudget(token_budget).into());
        }

        let session_id = store
            .create_session(token_budget, summary, parent_session)
            .await?;

        let pending = Arc::new(PendingOps::new());
        let failures: FailureLog = Arc::new(Mutex::new(VecDeque::new()));
        let resource_ids = Arc::new(Mutex::new(HashMap::new()));
        let max_recorded_errors = config.tracking.max_recorded_errors;

        let mut tracker = ResourceTracker::new(session_id.clone());
        {
            let store = Arc::clone(&store);
            let pending = Arc::clone(&pending);
            let failures = Arc::clone(&failures);
            let resource_ids = Arc::clone(&resource_ids);
            tracker.set_observer(Box::new(move |event| {
                let event = event.clone();
                let store = Arc::clone(&store);
                let failures = Arc::clone(&failures);
                let resource_ids = Arc::clone(&resource_ids);
                pending.track(async move {
                    match store
                        .upsert_resource(
                            &event.path,
                            event.resource_type,
                            event.metadata.size_bytes,
                            event.metadata.modified,
                            event.timestamp,
                        )
                        .await
                    {
                        Ok(id) => {
                            resource_ids.lock().insert(event.path.clone(), id);
                            if let Err(e) = store
                                .append_access_log(
                                    id,
                                    &event.session_id,
                                    event.access_type,
                                    event.timestamp,
                                )
                                .await
                            {
                                record_failure(
                                    &failures,
                                    max_recorded_errors,
                                    "append_access_log",
                                    &event.path,
                                    &e,
                                );
                            }
                        }
                        Err(e) => record_failure(
                            &failures,
                            max_recorded_errors,
                            "upsert_resource",
                            &event.path,
                            &e,
                        ),
                    }
                });
            }));
        }

        info!(session_id = %session_id, token_budget, "coordinator created");

        Ok(Self {
            session_id,
            store,
            estimator,
            tracker: Arc::new(Mutex::new(tracker)),
            pending,
            resource_ids,
            failures,
            state: Mutex::new(State::Active),
            prioritize_lock: tokio::sync::Mutex::new(()),
            barrier_timeout: Duration::from_millis(config.barrier.timeout_ms),
            max_recorded_errors,
        })
    }

    /// Session id assigned by the store.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if *self.state.lock() == State::Disposed {
            return Err(CoreError::Disposed.into());
        }
        Ok(())
    }

    /// Record a resource access.
    ///
    /// The in-memory tracker is updated synchronously; persistence (resource
    /// upsert plus access-log append) runs in the background and its
    /// failures never propagate here - tracking must not block or fail
    /// because storage is degraded. See [`Self::take_persistence_errors`].
    pub fn track_resource_access(
        &self,
        path: &str,
        resource_type: ResourceType,
        access_type: AccessType,
        metadata: AccessMetadata,
    ) -> Result<()> {
        self.ensure_not_disposed()?;
        self.tracker
            .lock()
            .track_access(path, resource_type, access_type, metadata)?;
        Ok(())
    }

    /// Select the most important resources that fit the token budget.
    ///
    /// Awaits persistence that was in flight at entry, ranks resources by
    /// importance, greedily accepts each that still fits, and keeps walking
    /// past rejections since a smaller low-importance resource may still
    /// fit. Importance and inclusion are persisted asynchronously for every
    /// evaluated resource.
    ///
    /// Concurrent calls are serialized.
    pub async fn prioritize_for_context(&self, token_budget: u64) -> Result<Prioritization> {
        self.ensure_not_disposed()?;
        if token_budget == 0 {
            return Err(CoreError::InvalidBudget(token_budget).into());
        }

        let _serialized = self.prioritize_lock.lock().await;
        self.ensure_not_disposed()?;
        *self.state.lock() = State::Prioritizing;

        let result = self.run_prioritization(token_budget).await;

        let mut state = self.state.lock();
        if *state == State::Prioritizing {
            *state = State::Active;
        }
        drop(state);

        result
    }

    async fn run_prioritization(&self, token_budget: u64) -> Result<Prioritization> {
        self.pending.barrier(self.barrier_timeout).await;

        let now = Utc::now();
        let ranked: Vec<(String, f64, ResourceType, Option<u64>)> = {
            let tracker = self.tracker.lock();
            tracker
                .ranked_with_scores(now)
                .into_iter()
                .filter_map(|(path, score)| {
                    tracker
                        .stats(&path)
                        .map(|s| (path, score, s.resource_type, s.size_bytes))
                })
                .collect()
        };

        let evaluated = ranked.len();
        let mut included = Vec::new();
        let mut skipped = Vec::new();
        let mut total_tokens: u64 = 0;

        for (path, score, resource_type, size_bytes) in ranked {
            let accepted = match self
                .estimator
                .estimate_resource_tokens(&path, resource_type, size_bytes)
            {
                Ok(tokens) => {
                    if total_tokens + tokens <= token_budget {
                        total_tokens += tokens;
                        included.push(path.clone());
                        true
                    } else {
                        false
                    }
                }
                Err(e) => {
                    debug!(path = %path, "excluding resource, estimation failed: {e}");
                    skipped.push(path.clone());
                    false
                }
            };
            self.persist_evaluation(path, score, accepted);
        }

        info!(
            session_id = %self.session_id,
            included = included.len(),
            evaluated,
            total_tokens,
            token_budget,
            "prioritization complete"
        );

        Ok(Prioritization {
            included,
            total_tokens,
            evaluated,
            skipped,
        })
    }

    fn persist_evaluation(&self, path: String, score: f64, included: bool) {
        let store = Arc::clone(&self.store);
        let session_id = self.session_id.clone();
        let resource_ids = Arc::clone(&self.resource_ids);
        let failures = Arc::clone(&self.failures);
        let cap = self.max_recorded_errors;

        self.pending.track(async move {
            let known = resource_ids.lock().get(&path).copied();
            let id = match known {
                Some(id) => Some(id),
                None => match store.find_resource(&path).await {
                    Ok(found) => found,
                    Err(e) => {
                        record_failure(&failures, cap, "find_resource", &path, &e);
                        return;
                    }
                },
            };
            let Some(id) = id else {
                // Resource row never made it to storage (its upsert failed
                // earlier); that failure is already recorded.
                debug!(path = %path, "no durable row for evaluated resource");
                return;
            };

            if let Err(e) = store.set_importance(&session_id, id, score).await {
                record_failure(&failures, cap, "set_importance", &path, &e);
            }
            if let Err(e) = store.set_included(&session_id, id, included).await {
                record_failure(&failures, cap, "set_included", &path, &e);
            }
        });
    }

    /// Render the Markdown metrics report for this session.
    ///
    /// Pure read over the durable store; mutates nothing.
    pub async fn generate_metrics_report(&self) -> Result<String> {
        self.ensure_not_disposed()?;
        let rows = self.store.query_session_resources(&self.session_id).await?;
        let estimator = Arc::clone(&self.estimator);
        Ok(report::render_metrics(&self.session_id, &rows, |r| {
            estimator
                .estimate_resource_tokens(&r.path, r.resource_type, r.size_bytes)
                .ok()
        }))
    }

    /// Drop a resource from tracking and from the durable store.
    ///
    /// A resource that never reached the store (persistence failed) is
    /// still removed from memory without error.
    pub async fn remove_resource(&self, path: &str) -> Result<()> {
        self.ensure_not_disposed()?;
        let normalized = focal_core::normalize_path(path)?;

        self.tracker.lock().remove(&normalized);
        self.resource_ids.lock().remove(&normalized);

        match self.store.remove_resource(&normalized).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drain recorded background persistence failures.
    ///
    /// The buffer is bounded; under sustained failure the most recent
    /// entries are retained.
    pub fn take_persistence_errors(&self) -> Vec<PersistenceFailure> {
        self.failures.lock().drain(..).collect()
    }

    /// Number of resources currently tracked in memory.
    pub fn resource_count(&self) -> usize {
        self.tracker.lock().len()
    }

    /// Unsubscribe from tracker events, await in-flight persistence, and
    /// mark the coordinator terminal. Idempotent; every operation after
    /// this fails with a disposed error.
    pub async fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if *state == State::Disposed {
                return;
            }
            *state = State::Disposed;
        }

        self.tracker.lock().clear_observer();
        self.pending.barrier(self.barrier_timeout).await;
        info!(session_id = %self.session_id, "coordinator disposed");
    }
}
