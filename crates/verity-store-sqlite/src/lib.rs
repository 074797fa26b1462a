//! SQLite backend for the Verity relevance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation is one `BEGIN IMMEDIATE`
//! transaction; audit entries are written after it commits.

mod assessments;
mod audit;
mod content_address;
mod datasets;
mod encode;
mod entities;
mod ingest;
mod judges;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};
