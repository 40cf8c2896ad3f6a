//! # focal-core
//!
//! Core types and abstractions for Focal - the session resource
//! prioritization engine.
//!
//! This crate provides:
//! - Resource and access-event primitives
//! - Path normalization
//! - Configuration system
//! - Outbound capability traits (token counting, semantic scoring)
//! - Common error types

pub mod capability;
pub mod config;
pub mod error;
pub mod path;
pub mod types;

pub use capability::{SemanticScorer, TokenCounter};
pub use config::Config;
pub use error::{Error, Result};
pub use path::normalize_path;
pub use types::{AccessEvent, AccessMetadata, AccessType, ResourceStats, ResourceType, SessionResource};
