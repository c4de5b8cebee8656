//! Offline revision journal.
//!
//! Demo and mock-data sessions have no server to reload revisions from, so
//! the controller records every revision it creates or resolves here, keyed
//! by document.

mod revisions;
mod schema;

use crate::models::SectionRevision;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

pub use schema::{create_tables, schema_version, SCHEMA_VERSION};

pub use revisions::RevisionRowError;
pub use revisions::{
    get as get_revision, list_by_document as list_revisions, original_digest,
    upsert as upsert_revision,
};

impl From<RevisionRowError> for crate::RevisionError {
    fn from(err: RevisionRowError) -> Self {
        match err {
            RevisionRowError::DatabaseError(e) => crate::RevisionError::Database(e),
            RevisionRowError::DigestMismatch(_) => crate::RevisionError::Integrity(err.to_string()),
            RevisionRowError::MissingDocument(_) => crate::RevisionError::Validation(err.to_string()),
            RevisionRowError::InvalidValue { .. } => crate::RevisionError::Internal(err.to_string()),
        }
    }
}

/// Opens a connection to the journal database file
///
/// Enables WAL mode for better concurrency and performance
pub fn get_connection(path: &Path) -> rusqlite::Result<Connection> {
    info!("Opening journal connection: {:?}", path);

    let conn = Connection::open(path)?;

    // journal_mode returns a value, so it goes through query_row
    let _journal_mode = conn.query_row("PRAGMA journal_mode = WAL", [], |row| {
        row.get::<_, String>(0)
    })?;

    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    Ok(conn)
}

pub struct Journal {
    conn: Mutex<Connection>,
}

impl Journal {
    /// Opens (creating if needed) the journal at `path`
    pub fn open(path: &Path) -> crate::Result<Self> {
        let conn = get_connection(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> crate::Result<Self> {
        create_tables(&conn).map_err(|e| {
            error!("Failed to create journal tables: {}", e);
            e
        })?;

        let version = schema_version(&conn)?;
        match version.as_deref().map(str::parse::<u32>) {
            Some(Ok(v)) if v <= SCHEMA_VERSION => {}
            _ => {
                error!("Unsupported journal schema version {:?}", version);
                return Err(crate::RevisionError::Integrity(format!(
                    "Journal schema version {} is not supported (expected at most {})",
                    version.as_deref().unwrap_or("<missing>"),
                    SCHEMA_VERSION
                )));
            }
        }

        Ok(Journal {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, revision: &SectionRevision) -> crate::Result<()> {
        upsert_revision(&self.connection(), revision)?;
        Ok(())
    }

    pub fn load_document(&self, document_id: &str) -> crate::Result<Vec<SectionRevision>> {
        let revisions = list_revisions(&self.connection(), document_id)?;
        Ok(revisions)
    }

    pub fn find(&self, revision_id: &str) -> crate::Result<SectionRevision> {
        get_revision(&self.connection(), revision_id)?
            .ok_or_else(|| crate::RevisionError::NotFound(format!("Revision {}", revision_id)))
    }
}
