#![forbid(unsafe_code)]
//! SQLite persistence for `playtree-core`.
//! Rows live in one `playtree_paths` table; every engine transaction is a `BEGIN IMMEDIATE`
//! transaction, so writers to the same database file are serialized.

#[cfg(feature = "rusqlite-storage")]
mod storage;
#[cfg(feature = "rusqlite-storage")]
pub use storage::{SqlitePathStore, SqliteTransaction};
