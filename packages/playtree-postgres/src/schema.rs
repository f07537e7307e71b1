use postgres::Client;
use playtree_core::{Error, Result};

const SCHEMA_LOCK_KEY: i64 = 0x706c617974726565; // "playtree"

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS playtree_paths (
  playlist_id TEXT NOT NULL,
  path TEXT NOT NULL,
  PRIMARY KEY (playlist_id, path)
);

CREATE INDEX IF NOT EXISTS idx_playtree_paths_prefix
  ON playtree_paths (playlist_id, path COLLATE "C");
"#;

pub fn ensure_schema(client: &mut Client) -> Result<()> {
    // Concurrent `IF NOT EXISTS` DDL can still collide on catalog entries, so schema setup runs
    // under a session-level advisory lock.
    client
        .query_one("SELECT pg_advisory_lock($1)", &[&SCHEMA_LOCK_KEY])
        .map_err(|e| Error::Storage(format!("{e:?}")))?;

    let res = client
        .batch_execute(SCHEMA_SQL)
        .map_err(|e| Error::Storage(format!("{e:?}")));

    // Released with the session anyway if this fails.
    let _ = client.query_one("SELECT pg_advisory_unlock($1)", &[&SCHEMA_LOCK_KEY]);

    if res.is_ok() {
        tracing::debug!("postgres playtree schema ready");
    }
    res
}

pub fn reset_playlist_for_tests(client: &mut Client, playlist_id: &str) -> Result<()> {
    client
        .execute(
            "DELETE FROM playtree_paths WHERE playlist_id = $1",
            &[&playlist_id],
        )
        .map_err(|e| Error::Storage(format!("{e:?}")))?;
    Ok(())
}
