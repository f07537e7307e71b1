//! Playlist mutations as single store transactions.
//!
//! Each operation opens one transaction, optionally locks the playlist, loads what it needs,
//! and either commits every row change or none. Failures are logged and returned; the dropped
//! transaction rolls back.

use std::collections::{HashMap, HashSet};

use crate::allocator;
use crate::builder::build;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::node::{NewItem, Node, Position};
use crate::path::{decode, validate_label, ItemKind, Path};
use crate::rebalance::{self, Relocations};
use crate::sync::SyncEngine;
use crate::traits::{PathStore, PathTransaction};
use crate::tree::OrderedTree;

pub struct PlaylistService<S> {
    store: S,
    config: EngineConfig,
}

impl<S: PathStore> PlaylistService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Append `items` to `playlist` (or to the nested playlists they name) and optionally
    /// rebalance the whole tree afterwards. Returns the final paths of the added entries.
    ///
    /// `explicit_position` only applies when exactly one item is given.
    pub fn add_items(
        &mut self,
        playlist: &str,
        items: &[NewItem],
        explicit_position: Option<Position>,
        rebalance: bool,
    ) -> Result<Vec<Path>> {
        let result = self.try_add_items(playlist, items, explicit_position, rebalance);
        logged("add_items", playlist, result)
    }

    fn try_add_items(
        &mut self,
        playlist: &str,
        items: &[NewItem],
        explicit_position: Option<Position>,
        rebalance: bool,
    ) -> Result<Vec<Path>> {
        validate_label(playlist)?;
        if items.is_empty() {
            return Err(Error::EmptyTree);
        }
        let mut tx = self.store.begin()?;
        let mut tree = load(&mut tx, playlist, &self.config)?;
        if let Some(limit) = self.config.max_playlist_items {
            if tree.size() + items.len() > limit {
                return Err(limit_exceeded(playlist, limit));
            }
        }

        let existing: HashSet<Path> = tree.paths().cloned().collect();
        let created = allocator::add(&mut tree, playlist, items, explicit_position)?;
        let relocations = if rebalance {
            rebalance::rebalance(&mut tree)
        } else {
            Relocations::new()
        };

        // Rows created by this call are inserted at their final path; pre-existing rows that a
        // rebalance moved are re-keyed.
        let fresh: HashSet<&Path> = created.iter().filter(|p| !existing.contains(*p)).collect();
        let mut inserted = OrderedTree::new();
        let mut moved = OrderedTree::new();
        for (path, node) in tree.iter() {
            let origin = relocations.get(path).unwrap_or(path);
            if fresh.contains(origin) {
                inserted.put(path.clone(), node.clone());
            } else if origin != path {
                moved.put(path.clone(), node.clone());
            }
        }

        let engine = SyncEngine::for_tree(playlist, &tree);
        if !moved.is_empty() {
            engine.update_all(&mut tx, &moved, &relocations)?;
        }
        if !inserted.is_empty() {
            engine.insert_all(&mut tx, &inserted)?;
        }
        tx.commit()?;

        let forward: HashMap<&Path, &Path> =
            relocations.iter().map(|(new, old)| (old, new)).collect();
        let finals: Vec<Path> = created
            .iter()
            .map(|path| forward.get(path).copied().unwrap_or(path).clone())
            .collect();
        tracing::info!(
            playlist,
            added = finals.len(),
            relocated = moved.size(),
            "added playlist items"
        );
        Ok(finals)
    }

    /// Append one entry after the last child of `parent` (the playlist itself when `None`)
    /// without loading the playlist tree. Appending a nested playlist loads it once to refuse
    /// cycles.
    pub fn append_item(
        &mut self,
        playlist: &str,
        parent: Option<&str>,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<Path> {
        let result = self.try_append_item(playlist, parent, kind, item_id);
        logged("append_item", playlist, result)
    }

    fn try_append_item(
        &mut self,
        playlist: &str,
        parent: Option<&str>,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<Path> {
        validate_label(playlist)?;
        let mut tx = self.store.begin()?;
        if self.config.lock_playlists {
            tx.lock_playlist(playlist)?;
        }
        if let Some(limit) = self.config.max_playlist_items {
            if tx.fetch_playlist_paths(playlist)?.len() >= limit {
                return Err(limit_exceeded(playlist, limit));
            }
        }
        let parent = parent.unwrap_or(playlist);
        if parent != playlist && !tx.contains_item(playlist, ItemKind::Playlist, parent)? {
            return Err(Error::UnknownItem(format!(
                "parent playlist {parent} is not part of {playlist}"
            )));
        }
        if kind == ItemKind::Playlist {
            let tree = build(tx.fetch_playlist_paths(playlist)?)?;
            allocator::check_acyclic(&tree, playlist, parent, kind, item_id)?;
        }
        let path = tx.append_under_prefix(playlist, parent, kind, item_id)?;
        tx.commit()?;
        tracing::info!(playlist, %path, "appended playlist item");
        Ok(path)
    }

    /// Move the listed root-level items to the front in the given order. Unlisted root-level
    /// items keep their relative order behind them; nested contents are untouched.
    pub fn set_order<I: AsRef<str>>(&mut self, playlist: &str, ordered_item_ids: &[I]) -> Result<()> {
        let result = self.try_set_order(playlist, ordered_item_ids);
        logged("set_order", playlist, result)
    }

    fn try_set_order<I: AsRef<str>>(&mut self, playlist: &str, ordered_item_ids: &[I]) -> Result<()> {
        validate_label(playlist)?;
        let mut tx = self.store.begin()?;
        let mut tree = load(&mut tx, playlist, &self.config)?;

        let mut current: Vec<(&Path, Position)> = tree
            .children_of(playlist)
            .map(|(path, node)| (path, node.position))
            .collect();
        current.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        let mut remaining: Vec<Option<Path>> =
            current.into_iter().map(|(path, _)| Some(path.clone())).collect();

        let mut ordered = Vec::with_capacity(remaining.len());
        for id in ordered_item_ids {
            let id = id.as_ref();
            let slot = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|path| path.item() == id));
            match slot {
                Some(slot) => ordered.extend(slot.take()),
                None if ordered.iter().any(|path: &Path| path.item() == id) => {
                    return Err(Error::InvalidOperation(format!(
                        "{id} is listed more often than it occurs in {playlist}"
                    )));
                }
                None => {
                    return Err(Error::UnknownItem(format!("{id} is not part of {playlist}")));
                }
            }
        }
        ordered.extend(remaining.into_iter().flatten());

        let relocations = rebalance::reorder(&mut tree, playlist, &ordered)?;
        if !relocations.is_empty() {
            let moved = relocated(&tree, &relocations);
            SyncEngine::for_tree(playlist, &tree).update_all(&mut tx, &moved, &relocations)?;
        }
        tx.commit()?;
        tracing::info!(playlist, moved = relocations.len(), "reordered playlist");
        Ok(())
    }

    /// Remove every occurrence of `item_id` and everything nested inside it. Returns the
    /// number of rows deleted.
    pub fn remove_item(&mut self, playlist: &str, item_id: &str) -> Result<usize> {
        let result = self.try_remove_item(playlist, item_id);
        logged("remove_item", playlist, result)
    }

    fn try_remove_item(&mut self, playlist: &str, item_id: &str) -> Result<usize> {
        validate_label(playlist)?;
        validate_label(item_id)?;
        let mut tx = self.store.begin()?;
        if self.config.lock_playlists {
            tx.lock_playlist(playlist)?;
        }
        let removed = tx.delete_subtree(playlist, item_id)?;
        if removed == 0 {
            return Err(Error::UnknownItem(format!("{item_id} is not part of {playlist}")));
        }

        if self.config.rebalance_on_remove {
            let mut tree = build(tx.fetch_playlist_paths(playlist)?)?;
            if !tree.is_empty() {
                let engine = SyncEngine::for_tree(playlist, &tree);
                let relocations = rebalance::rebalance(&mut tree);
                if !relocations.is_empty() {
                    let moved = relocated(&tree, &relocations);
                    engine.update_all(&mut tx, &moved, &relocations)?;
                }
            }
        }
        tx.commit()?;
        tracing::info!(playlist, item_id, removed, "removed playlist item");
        Ok(removed)
    }

    /// Entries of `playlist` in stored path-string order.
    pub fn list_items(&mut self, playlist: &str) -> Result<Vec<Node>> {
        validate_label(playlist)?;
        let mut tx = self.store.begin()?;
        let nodes = tx
            .fetch_ordered(playlist)?
            .iter()
            .map(|raw| decode(raw).map(|path| Node::from_path(&path)))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(nodes)
    }

    /// Tracks of `playlist` in listening order, nested playlists expanded in place.
    pub fn playback_order(&mut self, playlist: &str) -> Result<Vec<Node>> {
        validate_label(playlist)?;
        let mut tx = self.store.begin()?;
        let tree = build(tx.fetch_playlist_paths(playlist)?)?;
        tx.commit()?;
        Ok(tree.playback_order(playlist).into_iter().cloned().collect())
    }

    /// Remove every row of `playlist`. Returns the number of rows deleted.
    pub fn clear_playlist(&mut self, playlist: &str) -> Result<usize> {
        let result = self.try_clear_playlist(playlist);
        logged("clear_playlist", playlist, result)
    }

    fn try_clear_playlist(&mut self, playlist: &str) -> Result<usize> {
        validate_label(playlist)?;
        let mut tx = self.store.begin()?;
        if self.config.lock_playlists {
            tx.lock_playlist(playlist)?;
        }
        let removed = tx.clear_playlist(playlist)?;
        tx.commit()?;
        tracing::info!(playlist, removed, "cleared playlist");
        Ok(removed)
    }
}

fn load<T: PathTransaction>(tx: &mut T, playlist: &str, config: &EngineConfig) -> Result<OrderedTree> {
    if config.lock_playlists {
        tx.lock_playlist(playlist)?;
    }
    let tree = build(tx.fetch_playlist_paths(playlist)?)?;
    tracing::debug!(playlist, entries = tree.size(), "loaded playlist tree");
    Ok(tree)
}

/// The entries of `tree` that `relocations` moved.
fn relocated(tree: &OrderedTree, relocations: &Relocations) -> OrderedTree {
    let mut moved = OrderedTree::new();
    for path in relocations.keys() {
        if let Some(node) = tree.get(path) {
            moved.put(path.clone(), node.clone());
        }
    }
    moved
}

fn limit_exceeded(playlist: &str, limit: usize) -> Error {
    Error::InvalidOperation(format!("playlist {playlist} would exceed {limit} items"))
}

fn logged<T>(operation: &'static str, playlist: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::warn!(operation, playlist, error = %e, "playlist mutation rolled back");
    }
    result
}
