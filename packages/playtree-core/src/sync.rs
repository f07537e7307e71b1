use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::path::Path;
use crate::rebalance::Relocations;
use crate::traits::PathTransaction;
use crate::tree::OrderedTree;

/// Writes in-memory tree state back to a store transaction for one playlist.
///
/// The engine is built from the full tree of the playlist so it knows every root label that may
/// legally appear; the trees handed to `insert_all`/`update_all` can be subsets of it.
#[derive(Clone, Debug)]
pub struct SyncEngine<'p> {
    playlist: &'p str,
    known_roots: HashSet<String>,
}

impl<'p> SyncEngine<'p> {
    pub fn for_tree(playlist: &'p str, full: &OrderedTree) -> Self {
        Self {
            playlist,
            known_roots: full.known_roots(playlist),
        }
    }

    pub fn playlist(&self) -> &str {
        self.playlist
    }

    /// Insert one row per entry of `tree`.
    pub fn insert_all<T>(&self, tx: &mut T, tree: &OrderedTree) -> Result<usize>
    where
        T: PathTransaction + ?Sized,
    {
        self.check(tree)?;
        let paths: Vec<Path> = tree.paths().cloned().collect();
        tx.insert_paths(self.playlist, &paths)?;
        tracing::debug!(playlist = self.playlist, rows = paths.len(), "inserted paths");
        Ok(paths.len())
    }

    /// Re-key every entry of `tree` from its previous path in `old_paths` to its current path.
    /// Entries without a recorded previous path, or whose path did not change, are skipped.
    pub fn update_all<T>(
        &self,
        tx: &mut T,
        tree: &OrderedTree,
        old_paths: &Relocations,
    ) -> Result<usize>
    where
        T: PathTransaction + ?Sized,
    {
        self.check(tree)?;
        let mut moves = Vec::new();
        tree.each(|path, _| {
            let old = old_paths.get(path).unwrap_or(path);
            if old.root() != path.root() || old.item() != path.item() || old.kind() != path.kind()
            {
                return Err(Error::UnexpectedKeyType(format!(
                    "{old} cannot be re-keyed to {path}"
                )));
            }
            if old != path {
                moves.push((old.clone(), path.clone()));
            }
            Ok(())
        })?;
        if !moves.is_empty() {
            tx.update_paths(self.playlist, &moves)?;
        }
        tracing::debug!(playlist = self.playlist, rows = moves.len(), "updated paths");
        Ok(moves.len())
    }

    fn check(&self, tree: &OrderedTree) -> Result<()> {
        if tree.is_empty() {
            return Err(Error::EmptyTree);
        }
        tree.validate_invariants()?;
        tree.each(|path, _| {
            if self.known_roots.contains(path.root()) {
                Ok(())
            } else {
                Err(Error::UnexpectedKeyType(format!(
                    "{path} does not belong to playlist {}",
                    self.playlist
                )))
            }
        })
    }
}
