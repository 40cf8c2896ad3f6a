//! # focal-tokens
//!
//! Token estimation for Focal.
//!
//! This crate provides:
//! - [`TokenEstimator`]: a bounded cache over an injected
//!   [`TokenCounter`](focal_core::TokenCounter) capability
//! - Size-and-type based estimation for resources whose full text is not
//!   cheaply available
//! - [`HeuristicCounter`]: a characters-per-token fallback counter

pub mod estimator;

pub use estimator::{EstimationError, HeuristicCounter, TokenEstimator};
