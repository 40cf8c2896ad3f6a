//! # focal-store
//!
//! Durable resource store gateway for Focal.
//!
//! This crate provides:
//! - The [`ResourceStore`] trait: the narrow contract the engine relies on
//!   against the durable store (resource upsert with merge semantics,
//!   append-only access logs, per-session importance/inclusion updates)
//! - [`SqliteResourceStore`]: the SQLite-backed implementation
//!
//! Every gateway operation may fail (disk, corruption); failures are always
//! reported to the caller, never swallowed here. Each call is atomic on its
//! own; the engine issues no transactions spanning multiple operations.

pub mod gateway;
pub mod sqlite;

pub use gateway::{ResourceStore, Result, StoreError};
pub use sqlite::SqliteResourceStore;
