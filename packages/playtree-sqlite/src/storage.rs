use std::path::Path as FsPath;

use playtree_core::{
    error::Error,
    path::{prefix_of, ItemKind, Path},
    traits::{max_position_of, PathStore, PathTransaction},
    Position, Result,
};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

/// SQLite-backed `PathStore` keeping one row per `(playlist_id, path)`.
pub struct SqlitePathStore {
    conn: Connection,
}

impl SqlitePathStore {
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn new(path: impl AsRef<FsPath>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Underlying connection, for inspection outside engine transactions.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS playtree_paths (
                    playlist_id TEXT NOT NULL,
                    path TEXT NOT NULL,
                    PRIMARY KEY (playlist_id, path)
                );",
            )
            .map_err(storage_err)?;
        tracing::debug!("sqlite playtree schema ready");
        Ok(())
    }
}

impl PathStore for SqlitePathStore {
    type Tx<'a> = SqliteTransaction<'a>;

    fn begin(&mut self) -> Result<SqliteTransaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_err)?;
        Ok(SqliteTransaction { tx })
    }
}

/// Open `BEGIN IMMEDIATE` transaction. Dropping it without `commit` rolls back.
pub struct SqliteTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl SqliteTransaction<'_> {
    fn query_paths(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<String>> {
        let mut stmt = self.tx.prepare_cached(sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(args, |row| row.get::<_, String>(0))
            .map_err(storage_err)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(storage_err)?);
        }
        Ok(out)
    }

    fn insert_one(&self, playlist: &str, path: &Path) -> Result<()> {
        let mut stmt = self
            .tx
            .prepare_cached("INSERT INTO playtree_paths (playlist_id, path) VALUES (?1, ?2)")
            .map_err(storage_err)?;
        stmt.execute(params![playlist, path.as_str()])
            .map_err(storage_err)?;
        Ok(())
    }
}

impl PathTransaction for SqliteTransaction<'_> {
    fn lock_playlist(&mut self, _playlist: &str) -> Result<()> {
        // BEGIN IMMEDIATE already holds the database write lock.
        Ok(())
    }

    fn fetch_playlist_paths(&mut self, playlist: &str) -> Result<Vec<String>> {
        self.query_paths(
            "SELECT path FROM playtree_paths WHERE playlist_id = ?1 ORDER BY path",
            params![playlist],
        )
    }

    fn insert_paths(&mut self, playlist: &str, paths: &[Path]) -> Result<()> {
        for path in paths {
            self.insert_one(playlist, path)?;
        }
        Ok(())
    }

    fn update_paths(&mut self, playlist: &str, moves: &[(Path, Path)]) -> Result<()> {
        {
            let mut delete = self
                .tx
                .prepare_cached("DELETE FROM playtree_paths WHERE playlist_id = ?1 AND path = ?2")
                .map_err(storage_err)?;
            for (old, _) in moves {
                let changed = delete
                    .execute(params![playlist, old.as_str()])
                    .map_err(storage_err)?;
                if changed != 1 {
                    return Err(Error::Storage(format!(
                        "missing path {old} in playlist {playlist}"
                    )));
                }
            }
        }
        for (_, new) in moves {
            self.insert_one(playlist, new)?;
        }
        Ok(())
    }

    fn delete_item_rows(&mut self, playlist: &str, item_id: &str) -> Result<Vec<String>> {
        // Labels never contain '.', so ".<kind>.<item>." can only match the middle components.
        self.query_paths(
            "DELETE FROM playtree_paths
              WHERE playlist_id = ?1
                AND (instr(path, '.track.' || ?2 || '.') > 0
                     OR instr(path, '.playlist.' || ?2 || '.') > 0)
              RETURNING path",
            params![playlist, item_id],
        )
    }

    fn delete_prefix_rows(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>> {
        self.query_paths(
            "DELETE FROM playtree_paths
              WHERE playlist_id = ?1 AND substr(path, 1, length(?2)) = ?2
              RETURNING path",
            params![playlist, prefix],
        )
    }

    fn fetch_ordered_by_subtree(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>> {
        self.query_paths(
            "SELECT path FROM playtree_paths
              WHERE playlist_id = ?1 AND substr(path, 1, length(?2)) = ?2
              ORDER BY path",
            params![playlist, prefix],
        )
    }

    fn max_child_position(&mut self, playlist: &str, parent: &str) -> Result<Option<Position>> {
        let rows = self.fetch_ordered_by_subtree(playlist, &prefix_of(parent))?;
        max_position_of(&rows, parent)
    }

    fn contains_item(&mut self, playlist: &str, kind: ItemKind, item_id: &str) -> Result<bool> {
        self.tx
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM playtree_paths
                     WHERE playlist_id = ?1 AND instr(path, '.' || ?2 || '.' || ?3 || '.') > 0
                 )",
                params![playlist, kind.as_str(), item_id],
                |row| row.get::<_, bool>(0),
            )
            .map_err(storage_err)
    }

    fn clear_playlist(&mut self, playlist: &str) -> Result<usize> {
        self.tx
            .execute(
                "DELETE FROM playtree_paths WHERE playlist_id = ?1",
                params![playlist],
            )
            .map_err(storage_err)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit().map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playtree_core::{decode, Error, NewItem, PlaylistService};

    #[test]
    fn insert_and_fetch_round_trip() {
        let mut store = SqlitePathStore::new_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_paths(
            "P",
            &[
                decode("P.track.B.2").unwrap(),
                decode("P.track.A.10").unwrap(),
            ],
        )
        .unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        assert_eq!(
            tx.fetch_ordered("P").unwrap(),
            vec!["P.track.A.10", "P.track.B.2"]
        );
        assert_eq!(tx.max_child_position("P", "P").unwrap(), Some(10));
    }

    #[test]
    fn malformed_row_fails_service_load() {
        let mut store = SqlitePathStore::new_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO playtree_paths (playlist_id, path) VALUES ('P', 'P.track.T1')",
                [],
            )
            .unwrap();
        let mut service = PlaylistService::new(store);
        let err = service
            .add_items("P", &[NewItem::track("T2")], None, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPathFormat(_)));

        let count: i64 = service
            .store()
            .connection()
            .query_row("SELECT COUNT(*) FROM playtree_paths", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn duplicate_insert_is_storage_error() {
        let mut store = SqlitePathStore::new_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        let path = decode("P.track.A.1").unwrap();
        tx.insert_paths("P", std::slice::from_ref(&path)).unwrap();
        let err = tx.insert_paths("P", &[path]).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
