//! docshift - bulk document mutation engine for partitioned document stores
//!
//! Pages through a query result, applies a pluggable per-document
//! transform and writes the result back under optimistic concurrency.

pub mod cli;
pub mod crash_point;
pub mod document;
pub mod engine;
pub mod observability;
pub mod store;
pub mod transform;
