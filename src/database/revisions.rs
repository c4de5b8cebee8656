use crate::models::{RevisionStatus, RiskLevel, SectionRevision, SyncState};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevisionRowError {
    #[error("Revision {0} has no document id")]
    MissingDocument(String),
    #[error("Original text of revision {0} does not match its digest")]
    DigestMismatch(String),
    #[error("Invalid {field} in revision {id}: {value}")]
    InvalidValue {
        id: String,
        field: &'static str,
        value: String,
    },
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

/// Hex SHA-256 of a revision's original text
pub fn original_digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Columns as stored, before validation
struct RevisionRow {
    id: String,
    document_id: String,
    section_id: String,
    original_text: String,
    original_digest: String,
    proposed_text: String,
    comment: Option<String>,
    risk_level: Option<String>,
    ai_generated: bool,
    status: String,
    created_at: String,
    created_by: String,
}

impl RevisionRow {
    fn into_revision(self) -> std::result::Result<SectionRevision, RevisionRowError> {
        if original_digest(&self.original_text) != self.original_digest {
            return Err(RevisionRowError::DigestMismatch(self.id));
        }

        let status = RevisionStatus::parse(&self.status).ok_or_else(|| RevisionRowError::InvalidValue {
            id: self.id.clone(),
            field: "status",
            value: self.status.clone(),
        })?;
        let risk_level = match self.risk_level.as_deref() {
            None => None,
            Some(raw) => Some(RiskLevel::parse(raw).ok_or_else(|| RevisionRowError::InvalidValue {
                id: self.id.clone(),
                field: "risk_level",
                value: raw.to_string(),
            })?),
        };
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| RevisionRowError::InvalidValue {
                id: self.id.clone(),
                field: "created_at",
                value: self.created_at.clone(),
            })?
            .with_timezone(&Utc);

        Ok(SectionRevision {
            id: self.id,
            section_id: self.section_id,
            document_id: Some(self.document_id),
            original_text: self.original_text,
            proposed_text: self.proposed_text,
            comment: self.comment,
            risk_level,
            ai_generated: self.ai_generated,
            status,
            created_at,
            created_by: self.created_by,
            sync: SyncState::Confirmed,
        })
    }
}

/// Inserts a revision, or advances the stored status of an existing one.
///
/// Only the status of a row still `pending` is ever updated; the original
/// and proposed text of a stored revision never change.
pub fn upsert(conn: &Connection, revision: &SectionRevision) -> std::result::Result<(), RevisionRowError> {
    let document_id = revision
        .document_id
        .as_deref()
        .ok_or_else(|| RevisionRowError::MissingDocument(revision.id.clone()))?;
    let resolved_at = revision.status.is_terminal().then(|| timestamp(Utc::now()));

    conn.execute(
        "INSERT INTO revisions (id, document_id, section_id, original_text, original_digest,
                                proposed_text, comment, risk_level, ai_generated, status,
                                created_at, created_by, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            resolved_at = excluded.resolved_at
         WHERE revisions.status = 'pending' AND excluded.status != 'pending'",
        params![
            &revision.id,
            document_id,
            &revision.section_id,
            &revision.original_text,
            original_digest(&revision.original_text),
            &revision.proposed_text,
            &revision.comment,
            revision.risk_level.map(RiskLevel::as_str),
            revision.ai_generated,
            revision.status.as_str(),
            timestamp(revision.created_at),
            &revision.created_by,
            resolved_at,
        ],
    )?;

    Ok(())
}

/// Lists every revision recorded for a document, oldest first
pub fn list_by_document(
    conn: &Connection,
    document_id: &str,
) -> std::result::Result<Vec<SectionRevision>, RevisionRowError> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, section_id, original_text, original_digest, proposed_text,
                comment, risk_level, ai_generated, status, created_at, created_by
         FROM revisions
         WHERE document_id = ?1
         ORDER BY created_at, id",
    )?;

    let rows = stmt
        .query_map(params![document_id], read_row)?
        .collect::<Result<Vec<_>>>()?;

    rows.into_iter().map(RevisionRow::into_revision).collect()
}

/// Gets a revision by ID
///
/// Returns None if the revision doesn't exist.
pub fn get(conn: &Connection, id: &str) -> std::result::Result<Option<SectionRevision>, RevisionRowError> {
    let row = conn
        .query_row(
            "SELECT id, document_id, section_id, original_text, original_digest, proposed_text,
                    comment, risk_level, ai_generated, status, created_at, created_by
             FROM revisions
             WHERE id = ?1",
            params![id],
            read_row,
        )
        .optional()?;

    row.map(RevisionRow::into_revision).transpose()
}

fn read_row(row: &rusqlite::Row<'_>) -> Result<RevisionRow> {
    Ok(RevisionRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        section_id: row.get(2)?,
        original_text: row.get(3)?,
        original_digest: row.get(4)?,
        proposed_text: row.get(5)?,
        comment: row.get(6)?,
        risk_level: row.get(7)?,
        ai_generated: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
        created_by: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_tables;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn revision(id: &str) -> SectionRevision {
        SectionRevision::pending("s1", "A", "B", true, "AI Assistant")
            .with_id(id)
            .with_document(Some("doc-1".to_string()))
            .with_risk_level(Some(RiskLevel::High))
            .with_comment(Some("tighten".to_string()))
    }

    #[test]
    fn test_upsert_and_list() {
        let conn = memory_db();
        upsert(&conn, &revision("rev-1")).unwrap();
        upsert(&conn, &revision("rev-2").with_document(Some("doc-2".to_string()))).unwrap();

        let listed = list_by_document(&conn, "doc-1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "rev-1");
        assert_eq!(listed[0].risk_level, Some(RiskLevel::High));
        assert_eq!(listed[0].comment.as_deref(), Some("tighten"));
        assert!(listed[0].ai_generated);
    }

    #[test]
    fn test_status_only_moves_forward() {
        let conn = memory_db();
        let mut stored = revision("rev-1");
        upsert(&conn, &stored).unwrap();

        stored.status = RevisionStatus::Accepted;
        upsert(&conn, &stored).unwrap();
        assert_eq!(get(&conn, "rev-1").unwrap().unwrap().status, RevisionStatus::Accepted);

        stored.status = RevisionStatus::Rejected;
        upsert(&conn, &stored).unwrap();
        stored.status = RevisionStatus::Pending;
        upsert(&conn, &stored).unwrap();
        assert_eq!(get(&conn, "rev-1").unwrap().unwrap().status, RevisionStatus::Accepted);
    }

    #[test]
    fn test_original_text_is_never_rewritten() {
        let conn = memory_db();
        upsert(&conn, &revision("rev-1")).unwrap();

        let mut changed = revision("rev-1");
        changed.original_text = "Z".to_string();
        changed.status = RevisionStatus::Rejected;
        upsert(&conn, &changed).unwrap();

        let stored = get(&conn, "rev-1").unwrap().unwrap();
        assert_eq!(stored.original_text, "A");
        assert_eq!(stored.status, RevisionStatus::Rejected);
    }

    #[test]
    fn test_tampered_original_text_is_detected() {
        let conn = memory_db();
        upsert(&conn, &revision("rev-1")).unwrap();
        conn.execute(
            "UPDATE revisions SET original_text = 'edited behind our back' WHERE id = 'rev-1'",
            [],
        )
        .unwrap();

        assert!(matches!(
            list_by_document(&conn, "doc-1"),
            Err(RevisionRowError::DigestMismatch(id)) if id == "rev-1"
        ));
    }

    #[test]
    fn test_revision_without_document_is_refused() {
        let conn = memory_db();
        let orphan = revision("rev-1").with_document(None);
        assert!(matches!(
            upsert(&conn, &orphan),
            Err(RevisionRowError::MissingDocument(_))
        ));
    }

    #[test]
    fn test_missing_revision_is_none() {
        let conn = memory_db();
        assert!(get(&conn, "nope").unwrap().is_none());
    }
}
