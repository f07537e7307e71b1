#![forbid(unsafe_code)]
//! Postgres persistence for `playtree-core`.
//!
//! Path rows are stored in vanilla PostgreSQL. Prefix scans use byte-order comparisons so the
//! database agrees with the in-memory tree on ordering, and structural mutations of one playlist
//! are serialized with transaction-scoped advisory locks.

mod schema;
mod store;

pub use schema::{ensure_schema, reset_playlist_for_tests};
pub use store::{PostgresPathStore, PostgresTransaction};
