#![forbid(unsafe_code)]
//! Core of a materialized-path playlist engine.
//! Playlist entries are persisted as `root.type.item.position` strings; this crate parses them,
//! keeps an ordered in-memory tree, allocates and rebalances sibling positions, and writes
//! changes back through the storage traits defined here. Concrete backends live in sibling
//! crates.

pub mod allocator;
pub mod builder;
pub mod config;
pub mod error;
pub mod node;
pub mod path;
pub mod rebalance;
pub mod service;
pub mod sync;
pub mod traits;
pub mod tree;

pub use builder::{build, fill};
#[cfg(feature = "serde")]
pub use config::load_config;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use node::{NewItem, Node, Position};
pub use path::{decode, encode, ItemKind, Path};
pub use rebalance::{rebalance, reorder, Relocations};
pub use service::PlaylistService;
pub use sync::SyncEngine;
pub use traits::{MemoryPathStore, MemoryTransaction, PathStore, PathTransaction};
pub use tree::OrderedTree;
