//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Presence store (Redis)
//! - In-memory stores for single-process runs and tests
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod repositories;
pub mod storage;

pub use storage::{Backends, Storage};
