use crate::error::Result;
use crate::models::{RevisionAck, SectionRevision};
use async_trait::async_trait;

/// Remote source of truth for revisions.
///
/// Implementations report failures as errors and never touch local state.
#[async_trait]
pub trait RevisionApi: Send + Sync {
    async fn get_revisions_by_document(&self, document_id: &str) -> Result<Vec<SectionRevision>>;

    async fn accept_revision(&self, revision_id: &str) -> Result<RevisionAck>;

    async fn reject_revision(&self, revision_id: &str) -> Result<RevisionAck>;
}
