use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::allocator::position_after;
use crate::error::{Error, Result};
use crate::node::Position;
use crate::path::{decode, encode, prefix_of, ItemKind, Path};

/// Backing store of persisted `(playlist_id, path)` rows.
///
/// Every engine operation runs inside one transaction obtained from `begin`. Dropping a
/// transaction without calling `commit` must roll it back.
pub trait PathStore {
    type Tx<'a>: PathTransaction
    where
        Self: 'a;

    fn begin(&mut self) -> Result<Self::Tx<'_>>;
}

impl<S: PathStore + ?Sized> PathStore for &mut S {
    type Tx<'a> = S::Tx<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<S::Tx<'_>> {
        (**self).begin()
    }
}

/// Row-level operations available inside one store transaction.
pub trait PathTransaction {
    /// Serialize structural mutations of `playlist` until the transaction ends.
    fn lock_playlist(&mut self, playlist: &str) -> Result<()>;

    /// Every path row of `playlist`, ordered by path string.
    fn fetch_playlist_paths(&mut self, playlist: &str) -> Result<Vec<String>>;

    fn insert_paths(&mut self, playlist: &str, paths: &[Path]) -> Result<()>;

    /// Re-key rows `(old, new)`. All old rows are removed before any new row is written.
    fn update_paths(&mut self, playlist: &str, moves: &[(Path, Path)]) -> Result<()>;

    /// Remove rows whose item component is `item_id`, returning the removed paths.
    fn delete_item_rows(&mut self, playlist: &str, item_id: &str) -> Result<Vec<String>>;

    /// Remove rows starting with `prefix`, returning the removed paths.
    fn delete_prefix_rows(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>>;

    /// Rows starting with `prefix` (all rows for an empty prefix), ordered by path string.
    fn fetch_ordered_by_subtree(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>>;

    fn max_child_position(&mut self, playlist: &str, parent: &str) -> Result<Option<Position>>;

    fn contains_item(&mut self, playlist: &str, kind: ItemKind, item_id: &str) -> Result<bool>;

    fn clear_playlist(&mut self, playlist: &str) -> Result<usize>;

    fn commit(self) -> Result<()>
    where
        Self: Sized;

    fn fetch_ordered(&mut self, playlist: &str) -> Result<Vec<String>> {
        self.fetch_ordered_by_subtree(playlist, "")
    }

    /// Delete every row matching `item_id` together with everything stored inside it,
    /// following nested playlists transitively. Returns the number of rows removed.
    ///
    /// A nested playlist's contents go only once no surviving row references it, and the
    /// rows of `playlist` itself are never reached through a nested reference.
    fn delete_subtree(&mut self, playlist: &str, item_id: &str) -> Result<usize> {
        let first = self.delete_item_rows(playlist, item_id)?;
        let mut removed = first.len();
        let mut visited = HashSet::from([playlist.to_string()]);
        let mut pending = nested_playlists(&first)?;
        while let Some(label) = pending.pop() {
            // Removing the last reference to a skipped playlist queues it again.
            if visited.contains(&label)
                || self.contains_item(playlist, ItemKind::Playlist, &label)?
            {
                continue;
            }
            visited.insert(label.clone());
            let nested = self.delete_prefix_rows(playlist, &prefix_of(&label))?;
            removed += nested.len();
            pending.extend(nested_playlists(&nested)?);
        }
        tracing::debug!(playlist, item_id, removed, "deleted subtree");
        Ok(removed)
    }

    /// Append one entry after the current last child of `parent` without loading the tree.
    fn append_under_prefix(
        &mut self,
        playlist: &str,
        parent: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<Path> {
        let position = position_after(self.max_child_position(playlist, parent)?, parent)?;
        let path = encode(parent, kind, item_id, position)?;
        self.insert_paths(playlist, std::slice::from_ref(&path))?;
        Ok(path)
    }
}

fn nested_playlists(rows: &[String]) -> Result<Vec<String>> {
    let mut labels = Vec::new();
    for row in rows {
        let path = decode(row)?;
        if path.kind() == ItemKind::Playlist {
            labels.push(path.item().to_string());
        }
    }
    Ok(labels)
}

/// Highest position among `rows` that are direct children of `parent`.
pub fn max_position_of<I, S>(rows: I, parent: &str) -> Result<Option<Position>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prefix = prefix_of(parent);
    let mut max = None;
    for row in rows {
        let row = row.as_ref();
        if !row.starts_with(&prefix) {
            continue;
        }
        let position = decode(row)?.position();
        max = Some(max.map_or(position, |m: Position| m.max(position)));
    }
    Ok(max)
}

/// In-memory store for tests and embedding. Transactions work on a staged copy that replaces
/// the committed rows on `commit`.
#[derive(Clone, Debug, Default)]
pub struct MemoryPathStore {
    rows: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of `playlist`, ordered by path string.
    pub fn rows(&self, playlist: &str) -> Vec<String> {
        self.rows
            .get(playlist)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Seed raw rows, bypassing validation. Useful for exercising malformed data.
    pub fn seed<I, S>(&mut self, playlist: &str, rows: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows
            .entry(playlist.to_string())
            .or_default()
            .extend(rows.into_iter().map(Into::into));
    }
}

impl PathStore for MemoryPathStore {
    type Tx<'a> = MemoryTransaction<'a>;

    fn begin(&mut self) -> Result<MemoryTransaction<'_>> {
        let staged = self.rows.clone();
        Ok(MemoryTransaction {
            store: self,
            staged,
        })
    }
}

pub struct MemoryTransaction<'a> {
    store: &'a mut MemoryPathStore,
    staged: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryTransaction<'_> {
    fn playlist_rows(&mut self, playlist: &str) -> &mut BTreeSet<String> {
        self.staged.entry(playlist.to_string()).or_default()
    }

    fn delete_where(&mut self, playlist: &str, doomed: impl Fn(&str) -> bool) -> Vec<String> {
        let rows = self.playlist_rows(playlist);
        let removed: Vec<String> = rows.iter().filter(|r| doomed(r)).cloned().collect();
        for row in &removed {
            rows.remove(row);
        }
        removed
    }
}

impl PathTransaction for MemoryTransaction<'_> {
    fn lock_playlist(&mut self, _playlist: &str) -> Result<()> {
        // The transaction already holds the store exclusively.
        Ok(())
    }

    fn fetch_playlist_paths(&mut self, playlist: &str) -> Result<Vec<String>> {
        Ok(self.playlist_rows(playlist).iter().cloned().collect())
    }

    fn insert_paths(&mut self, playlist: &str, paths: &[Path]) -> Result<()> {
        let rows = self.playlist_rows(playlist);
        for path in paths {
            if !rows.insert(path.to_string()) {
                return Err(Error::Storage(format!(
                    "duplicate path {path} in playlist {playlist}"
                )));
            }
        }
        Ok(())
    }

    fn update_paths(&mut self, playlist: &str, moves: &[(Path, Path)]) -> Result<()> {
        let rows = self.playlist_rows(playlist);
        for (old, _) in moves {
            if !rows.remove(old.as_str()) {
                return Err(Error::Storage(format!(
                    "missing path {old} in playlist {playlist}"
                )));
            }
        }
        for (_, new) in moves {
            if !rows.insert(new.to_string()) {
                return Err(Error::Storage(format!(
                    "duplicate path {new} in playlist {playlist}"
                )));
            }
        }
        Ok(())
    }

    fn delete_item_rows(&mut self, playlist: &str, item_id: &str) -> Result<Vec<String>> {
        Ok(self.delete_where(playlist, |row| {
            row.split('.').nth(2) == Some(item_id)
        }))
    }

    fn delete_prefix_rows(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self.delete_where(playlist, |row| row.starts_with(prefix)))
    }

    fn fetch_ordered_by_subtree(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .playlist_rows(playlist)
            .iter()
            .filter(|row| row.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn max_child_position(&mut self, playlist: &str, parent: &str) -> Result<Option<Position>> {
        let rows = self.playlist_rows(playlist).clone();
        max_position_of(&rows, parent)
    }

    fn contains_item(&mut self, playlist: &str, kind: ItemKind, item_id: &str) -> Result<bool> {
        Ok(self.playlist_rows(playlist).iter().any(|row| {
            let mut parts = row.split('.').skip(1);
            parts.next() == Some(kind.as_str()) && parts.next() == Some(item_id)
        }))
    }

    fn clear_playlist(&mut self, playlist: &str) -> Result<usize> {
        Ok(self
            .staged
            .remove(playlist)
            .map(|rows| rows.len())
            .unwrap_or(0))
    }

    fn commit(self) -> Result<()> {
        self.store.rows = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_transaction_discards_changes() {
        let mut store = MemoryPathStore::new();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_paths("P", &[decode("P.track.A.1").unwrap()]).unwrap();
        }
        assert!(store.rows("P").is_empty());

        let mut tx = store.begin().unwrap();
        tx.insert_paths("P", &[decode("P.track.A.1").unwrap()]).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.rows("P"), vec!["P.track.A.1"]);
    }

    #[test]
    fn delete_subtree_follows_nested_playlists() {
        let mut store = MemoryPathStore::new();
        store.seed(
            "P",
            [
                "P.track.A.1",
                "P.playlist.Q.2",
                "Q.track.X.1",
                "Q.playlist.R.2",
                "R.track.Y.1",
                "R.playlist.Q.2",
                "P.track.C.3",
            ],
        );
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.delete_subtree("P", "Q").unwrap(), 5);
        assert_eq!(tx.fetch_ordered("P").unwrap(), vec!["P.track.A.1", "P.track.C.3"]);
    }

    #[test]
    fn delete_subtree_never_reaches_the_root_playlist() {
        let mut store = MemoryPathStore::new();
        store.seed(
            "P",
            ["P.track.A.1", "P.playlist.Q.2", "P.track.C.3", "Q.playlist.P.1"],
        );
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.delete_subtree("P", "Q").unwrap(), 2);
        assert_eq!(tx.fetch_ordered("P").unwrap(), vec!["P.track.A.1", "P.track.C.3"]);
    }

    #[test]
    fn delete_subtree_keeps_playlists_referenced_elsewhere() {
        let mut store = MemoryPathStore::new();
        store.seed(
            "P",
            [
                "P.playlist.Q.1",
                "Q.track.X.1",
                "Q.playlist.R.2",
                "R.track.Y.1",
                "R.playlist.Q.2",
            ],
        );
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.delete_subtree("P", "R").unwrap(), 3);
        assert_eq!(tx.fetch_ordered("P").unwrap(), vec!["P.playlist.Q.1", "Q.track.X.1"]);
    }

    #[test]
    fn delete_subtree_revisits_playlists_released_later() {
        // Z is still referenced from T when first reached; T's removal releases it.
        let mut store = MemoryPathStore::new();
        store.seed(
            "P",
            [
                "P.playlist.Q.1",
                "Q.playlist.T.1",
                "Q.playlist.Z.2",
                "T.playlist.Z.1",
                "Z.track.X.1",
            ],
        );
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.delete_subtree("P", "Q").unwrap(), 5);
        assert!(tx.fetch_ordered("P").unwrap().is_empty());
    }

    #[test]
    fn append_under_prefix_uses_max_plus_one() {
        let mut store = MemoryPathStore::new();
        store.seed("P", ["P.track.A.9", "P.playlist.Q.3", "Q.track.X.40"]);
        let mut tx = store.begin().unwrap();
        let path = tx
            .append_under_prefix("P", "P", ItemKind::Track, "B")
            .unwrap();
        assert_eq!(path.as_str(), "P.track.B.10");
        let nested = tx
            .append_under_prefix("P", "Q", ItemKind::Track, "Y")
            .unwrap();
        assert_eq!(nested.as_str(), "Q.track.Y.41");
        assert!(tx.contains_item("P", ItemKind::Playlist, "Q").unwrap());
        assert!(!tx.contains_item("P", ItemKind::Track, "Q").unwrap());
    }

    #[test]
    fn append_under_prefix_refuses_to_wrap() {
        let mut store = MemoryPathStore::new();
        store.seed("P", ["P.track.A.18446744073709551615"]);
        let mut tx = store.begin().unwrap();
        let err = tx
            .append_under_prefix("P", "P", ItemKind::Track, "B")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert_eq!(tx.fetch_ordered("P").unwrap(), vec!["P.track.A.18446744073709551615"]);
    }
}
