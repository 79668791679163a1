//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **Pagination**: 1-indexed offset paging (`page`, `limit` → `skip`, `limit`)
//! - **Page**: a page of results with the total match count

mod pagination;

pub use pagination::*;
