use rusqlite::{params, Connection};

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
///
/// `external_id` carries a unique index: it is the deduplication key and the
/// storage-level guard against concurrent ingestion of the same repository.
/// SQLite treats NULLs as distinct, so id-less rows may coexist.
pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repositories (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id   INTEGER,
    name          TEXT NOT NULL,
    owner         TEXT,
    description   TEXT,
    language      TEXT,
    popularity    INTEGER NOT NULL DEFAULT 0,
    secondary     INTEGER NOT NULL DEFAULT 0,
    last_activity INTEGER,              -- epoch millis
    created_at    INTEGER NOT NULL,     -- epoch millis
    touched_at    INTEGER NOT NULL      -- epoch millis
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_repositories_external_id ON repositories(external_id);
CREATE INDEX IF NOT EXISTS idx_repositories_language   ON repositories(language);
CREATE INDEX IF NOT EXISTS idx_repositories_popularity ON repositories(popularity);
"#;

pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Returns `None` if the version row is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let value: String = row.get(0)?;
            Ok(value.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
