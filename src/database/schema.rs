use rusqlite::{Connection, OptionalExtension, Result};
use tracing::info;

/// Journal layout version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Creates the journal schema
///
/// One `revisions` table keyed by revision id, indexed by document, plus a
/// `journal_meta` table recording the schema version.
pub fn create_tables(conn: &Connection) -> Result<()> {
    info!("Creating journal schema");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS revisions (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            original_text TEXT NOT NULL,
            original_digest TEXT NOT NULL,
            proposed_text TEXT NOT NULL,
            comment TEXT,
            risk_level TEXT,
            ai_generated INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'rejected')),
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            resolved_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS journal_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO journal_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_revisions_document_id ON revisions(document_id)",
        [],
    )?;

    info!("Journal schema created successfully");
    Ok(())
}

/// Reads the layout version recorded in `journal_meta`, if any.
pub fn schema_version(conn: &Connection) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM journal_meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )
    .optional()
}
