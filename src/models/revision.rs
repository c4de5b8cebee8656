use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Author recorded on AI-originated revisions
pub const AI_AUTHOR: &str = "AI Assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RevisionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RevisionStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RevisionStatus::Pending => "pending",
            RevisionStatus::Accepted => "accepted",
            RevisionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RevisionStatus::Pending),
            "accepted" => Some(RevisionStatus::Accepted),
            "rejected" => Some(RevisionStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Whether the local state of a revision has been confirmed by the server.
///
/// Revisions decoded from a server payload are `Confirmed`; local mutations in
/// networked mode stay `Tentative` until the next reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    Tentative,
    #[default]
    Confirmed,
}

/// A proposed change to the text of one document section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRevision {
    #[serde(default = "new_revision_id")]
    pub id: String,
    pub section_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub original_text: String,
    pub proposed_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub ai_generated: bool,
    pub status: RevisionStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(skip)]
    pub sync: SyncState,
}

fn new_revision_id() -> String {
    Uuid::new_v4().to_string()
}

impl SectionRevision {
    /// Creates a pending revision with a fresh id, capturing `original_text` as of now.
    pub fn pending(
        section_id: impl Into<String>,
        original_text: impl Into<String>,
        proposed_text: impl Into<String>,
        ai_generated: bool,
        created_by: impl Into<String>,
    ) -> Self {
        SectionRevision {
            id: new_revision_id(),
            section_id: section_id.into(),
            document_id: None,
            original_text: original_text.into(),
            proposed_text: proposed_text.into(),
            comment: None,
            risk_level: None,
            ai_generated,
            status: RevisionStatus::Pending,
            created_at: Utc::now(),
            created_by: created_by.into(),
            sync: SyncState::Confirmed,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_document(mut self, document_id: Option<String>) -> Self {
        self.document_id = document_id;
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_risk_level(mut self, risk_level: Option<RiskLevel>) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_sync(mut self, sync: SyncState) -> Self {
        self.sync = sync;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == RevisionStatus::Pending
    }

    /// Moves a pending revision to `status`. Returns false, leaving the
    /// revision untouched, if it is already resolved or `status` is `Pending`.
    pub fn resolve(&mut self, status: RevisionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

/// Body returned by the accept/reject endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionAck {
    pub id: String,
    pub status: RevisionStatus,
}
