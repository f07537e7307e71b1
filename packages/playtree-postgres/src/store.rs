use std::cell::RefCell;
use std::rc::Rc;

use postgres::types::ToSql;
use postgres::{Client, NoTls};

use playtree_core::path::prefix_of;
use playtree_core::{decode, Error, ItemKind, Path, PathStore, PathTransaction, Position, Result};

const INSERT_BATCH: usize = 1_000;

fn storage_debug<E: std::fmt::Debug>(e: E) -> Error {
    Error::Storage(format!("{e:?}"))
}

/// `PathStore` over a shared synchronous Postgres client.
pub struct PostgresPathStore {
    client: Rc<RefCell<Client>>,
}

impl PostgresPathStore {
    pub fn new(client: Rc<RefCell<Client>>) -> Self {
        Self { client }
    }

    pub fn connect(url: &str) -> Result<Self> {
        let client = Client::connect(url, NoTls).map_err(storage_debug)?;
        Ok(Self::new(Rc::new(RefCell::new(client))))
    }

    pub fn client(&self) -> &Rc<RefCell<Client>> {
        &self.client
    }
}

impl PathStore for PostgresPathStore {
    type Tx<'a> = PostgresTransaction<'a>;

    fn begin(&mut self) -> Result<PostgresTransaction<'_>> {
        self.client
            .borrow_mut()
            .batch_execute("BEGIN")
            .map_err(storage_debug)?;
        Ok(PostgresTransaction {
            client: &self.client,
            open: true,
        })
    }
}

/// Open transaction on the store's client. Rolled back on drop unless committed.
pub struct PostgresTransaction<'a> {
    client: &'a RefCell<Client>,
    open: bool,
}

impl Drop for PostgresTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.client.borrow_mut().batch_execute("ROLLBACK");
        }
    }
}

impl PostgresTransaction<'_> {
    fn query_paths(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<String>> {
        let mut c = self.client.borrow_mut();
        let rows = c.query(sql, params).map_err(storage_debug)?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }
}

impl PathTransaction for PostgresTransaction<'_> {
    fn lock_playlist(&mut self, playlist: &str) -> Result<()> {
        self.client
            .borrow_mut()
            .query_one(
                "SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))",
                &[&playlist],
            )
            .map_err(storage_debug)?;
        Ok(())
    }

    fn fetch_playlist_paths(&mut self, playlist: &str) -> Result<Vec<String>> {
        self.query_paths(
            r#"SELECT path FROM playtree_paths WHERE playlist_id = $1 ORDER BY path COLLATE "C""#,
            &[&playlist],
        )
    }

    fn insert_paths(&mut self, playlist: &str, paths: &[Path]) -> Result<()> {
        let mut c = self.client.borrow_mut();
        for chunk in paths.chunks(INSERT_BATCH) {
            let raw: Vec<&str> = chunk.iter().map(Path::as_str).collect();
            c.execute(
                "INSERT INTO playtree_paths (playlist_id, path)
                 SELECT $1::text, p FROM UNNEST($2::text[]) AS p",
                &[&playlist, &raw],
            )
            .map_err(storage_debug)?;
        }
        Ok(())
    }

    fn update_paths(&mut self, playlist: &str, moves: &[(Path, Path)]) -> Result<()> {
        {
            let mut c = self.client.borrow_mut();
            for chunk in moves.chunks(INSERT_BATCH) {
                let old: Vec<&str> = chunk.iter().map(|(old, _)| old.as_str()).collect();
                let deleted = c
                    .execute(
                        "DELETE FROM playtree_paths WHERE playlist_id = $1 AND path = ANY($2::text[])",
                        &[&playlist, &old],
                    )
                    .map_err(storage_debug)?;
                if deleted as usize != old.len() {
                    return Err(Error::Storage(format!(
                        "expected to re-key {} rows of playlist {playlist}, found {deleted}",
                        old.len()
                    )));
                }
            }
        }
        let new: Vec<Path> = moves.iter().map(|(_, new)| new.clone()).collect();
        self.insert_paths(playlist, &new)
    }

    fn delete_item_rows(&mut self, playlist: &str, item_id: &str) -> Result<Vec<String>> {
        self.query_paths(
            "DELETE FROM playtree_paths
              WHERE playlist_id = $1 AND split_part(path, '.', 3) = $2::text
              RETURNING path",
            &[&playlist, &item_id],
        )
    }

    fn delete_prefix_rows(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>> {
        self.query_paths(
            "DELETE FROM playtree_paths
              WHERE playlist_id = $1 AND left(path, length($2::text)) = $2::text
              RETURNING path",
            &[&playlist, &prefix],
        )
    }

    fn fetch_ordered_by_subtree(&mut self, playlist: &str, prefix: &str) -> Result<Vec<String>> {
        self.query_paths(
            r#"SELECT path FROM playtree_paths
                WHERE playlist_id = $1 AND left(path, length($2::text)) = $2::text
                ORDER BY path COLLATE "C""#,
            &[&playlist, &prefix],
        )
    }

    fn max_child_position(&mut self, playlist: &str, parent: &str) -> Result<Option<Position>> {
        // Canonical positions have no leading zeros: longer is larger, equal length compares
        // as text.
        let prefix = prefix_of(parent);
        let top = self.query_paths(
            r#"SELECT path FROM playtree_paths
                WHERE playlist_id = $1 AND left(path, length($2::text)) = $2::text
                ORDER BY length(split_part(path, '.', 4)) DESC,
                         split_part(path, '.', 4) COLLATE "C" DESC
                LIMIT 1"#,
            &[&playlist, &prefix],
        )?;
        match top.first() {
            Some(raw) => Ok(Some(decode(raw)?.position())),
            None => Ok(None),
        }
    }

    fn contains_item(&mut self, playlist: &str, kind: ItemKind, item_id: &str) -> Result<bool> {
        let row = self
            .client
            .borrow_mut()
            .query_one(
                "SELECT EXISTS(
                    SELECT 1 FROM playtree_paths
                     WHERE playlist_id = $1
                       AND split_part(path, '.', 2) = $2::text
                       AND split_part(path, '.', 3) = $3::text
                 )",
                &[&playlist, &kind.as_str(), &item_id],
            )
            .map_err(storage_debug)?;
        Ok(row.get::<_, bool>(0))
    }

    fn clear_playlist(&mut self, playlist: &str) -> Result<usize> {
        let removed = self
            .client
            .borrow_mut()
            .execute(
                "DELETE FROM playtree_paths WHERE playlist_id = $1",
                &[&playlist],
            )
            .map_err(storage_debug)?;
        Ok(removed as usize)
    }

    fn commit(mut self) -> Result<()> {
        self.client
            .borrow_mut()
            .batch_execute("COMMIT")
            .map_err(storage_debug)?;
        self.open = false;
        Ok(())
    }
}
