//! Core types and trait definitions for the Verity relevance store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the domain model, the pure parts of the engine (canonical hashing, sampling,
//! lineage checks, status transition tables) and the [`store::RelevanceStore`]
//! trait every backend implements.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod article;
pub mod assessment;
pub mod audit;
pub mod content;
pub mod dataset;
pub mod error;
pub mod idempotency;
pub mod import;
pub mod judge;
pub mod sampling;
pub mod store;
pub mod topic;

pub use error::{Classify, Error, ErrorKind, Result};
