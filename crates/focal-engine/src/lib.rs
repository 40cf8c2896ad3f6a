//! # focal-engine
//!
//! Resource tracking and context prioritization for Focal.
//!
//! This crate provides:
//! - [`ResourceTracker`]: in-memory authoritative access statistics and
//!   derived importance scoring
//! - [`PrioritizationCoordinator`]: session lifecycle, asynchronous
//!   persistence with a pending-operations barrier, budget-constrained
//!   greedy selection, and the metrics report
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use focal_core::{AccessMetadata, AccessType, Config, ResourceType};
//! use focal_engine::PrioritizationCoordinator;
//! use focal_store::SqliteResourceStore;
//! use focal_tokens::{HeuristicCounter, TokenEstimator};
//!
//! let store = Arc::new(SqliteResourceStore::open_default()?);
//! let config = Config::load_validated()?;
//! let estimator = Arc::new(TokenEstimator::new(
//!     Arc::new(HeuristicCounter::new()),
//!     config.tokens.clone(),
//! ));
//!
//! let coordinator =
//!     PrioritizationCoordinator::new(store, estimator, config, 50_000, "review session").await?;
//!
//! coordinator.track_resource_access(
//!     "/src/main.rs",
//!     ResourceType::Code,
//!     AccessType::Edit,
//!     AccessMetadata::with_size(4096),
//! )?;
//!
//! let selection = coordinator.prioritize_for_context(8_000).await?;
//! println!("{}", coordinator.generate_metrics_report().await?);
//! coordinator.dispose().await;
//! ```
//!
//! ## Ordering Guarantee
//!
//! Tracking updates in-memory state synchronously and persists in the
//! background. Before a prioritization run reads derived state, the
//! coordinator awaits the snapshot of persistence operations that were
//! in flight when the run began, so selection never races writes it
//! depends on.

pub mod coordinator;
pub mod report;
pub mod tracker;

pub use coordinator::{
    EngineError, PersistenceFailure, Prioritization, PrioritizationCoordinator, Result,
};
pub use tracker::{importance_at, AccessObserver, ResourceTracker};
