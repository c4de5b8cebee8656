//! Canonical in-memory revision state for one review session.
//!
//! Every operation here is synchronous and touches nothing but the store
//! itself. Lookups that miss (unknown section, unknown or already resolved
//! revision) are logged and reported as [`StoreOutcome::Ignored`] rather than
//! returned as errors: they mean the UI is showing stale state.

use crate::models::{Document, DocumentSection, RevisionStatus, RiskLevel, SectionRevision, SyncState, AI_AUTHOR};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub type SharedStore = Arc<Mutex<RevisionStore>>;

/// Locks a shared store. A panic in another holder cannot leave the store
/// half-updated (every mutation completes before the guard drops), so a
/// poisoned lock is recovered rather than propagated.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, RevisionStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum StoreOutcome {
    Applied,
    Ignored,
}

impl StoreOutcome {
    pub fn is_applied(self) -> bool {
        self == StoreOutcome::Applied
    }
}

#[derive(Debug)]
pub struct RevisionStore {
    current_document: Option<Document>,
    revisions: Vec<SectionRevision>,
    pending_revisions: Vec<SectionRevision>,
    highlighted_section: Option<String>,
    actor: String,
}

impl Default for RevisionStore {
    fn default() -> Self {
        RevisionStore::new("Current User")
    }
}

impl RevisionStore {
    /// `actor` is recorded as `created_by` on user-originated revisions.
    pub fn new(actor: impl Into<String>) -> Self {
        RevisionStore {
            current_document: None,
            revisions: Vec::new(),
            pending_revisions: Vec::new(),
            highlighted_section: None,
            actor: actor.into(),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn current_document(&self) -> Option<&Document> {
        self.current_document.as_ref()
    }

    pub fn current_document_id(&self) -> Option<&str> {
        self.current_document.as_ref().map(|doc| doc.id.as_str())
    }

    pub fn section(&self, section_id: &str) -> Option<&DocumentSection> {
        self.current_document.as_ref()?.section(section_id)
    }

    /// Resolved revisions, in the order they were resolved.
    pub fn revisions(&self) -> &[SectionRevision] {
        &self.revisions
    }

    pub fn pending_revisions(&self) -> &[SectionRevision] {
        &self.pending_revisions
    }

    /// Pending revisions followed by resolved ones.
    pub fn all_revisions(&self) -> impl Iterator<Item = &SectionRevision> {
        self.pending_revisions.iter().chain(self.revisions.iter())
    }

    pub fn revisions_for_document<'a>(
        &'a self,
        document_id: &'a str,
    ) -> impl Iterator<Item = &'a SectionRevision> + 'a {
        self.all_revisions()
            .filter(move |r| r.document_id.as_deref() == Some(document_id))
    }

    pub fn find_revision(&self, revision_id: &str) -> Option<&SectionRevision> {
        self.all_revisions().find(|r| r.id == revision_id)
    }

    pub fn highlighted_section(&self) -> Option<&str> {
        self.highlighted_section.as_deref()
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Replaces the loaded document. Pending proposals belong to the old
    /// document and are dropped; resolved history is kept.
    pub fn set_current_document(&mut self, document: Option<Document>) {
        match &document {
            Some(doc) => info!("Loading document {} ({} sections)", doc.id, doc.sections().len()),
            None => info!("Clearing current document"),
        }
        if !self.pending_revisions.is_empty() {
            debug!("Dropping {} pending revisions", self.pending_revisions.len());
            self.pending_revisions.clear();
        }
        self.current_document = document;
        self.highlighted_section = None;
    }

    pub fn set_highlighted_section(&mut self, section_id: Option<String>) {
        self.highlighted_section = section_id;
    }

    /// Replaces a section's text. With `record_audit`, the change is first
    /// recorded as an already accepted revision holding the previous text.
    pub fn update_document_section(
        &mut self,
        section_id: &str,
        new_text: &str,
        record_audit: bool,
    ) -> StoreOutcome {
        let document_id = self.current_document_id().map(str::to_string);
        let Some(section) = self
            .current_document
            .as_mut()
            .and_then(|doc| doc.section_mut(section_id))
        else {
            warn!("Section {} not found, update ignored", section_id);
            return StoreOutcome::Ignored;
        };

        if record_audit {
            let mut audit = SectionRevision::pending(
                section_id,
                section.text.clone(),
                new_text,
                false,
                self.actor.clone(),
            )
            .with_document(document_id);
            audit.status = RevisionStatus::Accepted;
            debug!("Recording direct edit {} on section {}", audit.id, section_id);
            self.revisions.push(audit);
        }

        section.text = new_text.to_string();
        StoreOutcome::Applied
    }

    /// Records a new pending revision against the section's current text and
    /// highlights the section. Returns a copy of the revision, or `None` if
    /// the section does not exist.
    pub fn propose_revision(
        &mut self,
        section_id: &str,
        proposed_text: &str,
        ai_generated: bool,
        comment: Option<String>,
        risk_level: Option<RiskLevel>,
    ) -> Option<SectionRevision> {
        let Some(section) = self.section(section_id) else {
            warn!("Section {} not found, proposal ignored", section_id);
            return None;
        };

        let created_by = if ai_generated {
            AI_AUTHOR.to_string()
        } else {
            self.actor.clone()
        };
        let revision = SectionRevision::pending(
            section_id,
            section.text.clone(),
            proposed_text,
            ai_generated,
            created_by,
        )
        .with_document(self.current_document_id().map(str::to_string))
        .with_comment(comment)
        .with_risk_level(risk_level);

        info!("Proposed revision {} on section {}", revision.id, section_id);
        self.pending_revisions.push(revision.clone());
        self.highlighted_section = Some(section_id.to_string());
        Some(revision)
    }

    /// Applies a pending revision's proposed text and moves it to history.
    ///
    /// If the target section is no longer in the document the revision stays
    /// pending, so an accepted revision always corresponds to applied text.
    pub fn accept_revision(&mut self, revision_id: &str) -> StoreOutcome {
        let Some(index) = self.pending_index(revision_id) else {
            warn!("Pending revision {} not found, accept ignored", revision_id);
            return StoreOutcome::Ignored;
        };

        let section_id = self.pending_revisions[index].section_id.clone();
        let proposed_text = self.pending_revisions[index].proposed_text.clone();
        if !self
            .update_document_section(&section_id, &proposed_text, false)
            .is_applied()
        {
            warn!(
                "Revision {} targets missing section {}, left pending",
                revision_id, section_id
            );
            return StoreOutcome::Ignored;
        }

        self.resolve_pending(index, RevisionStatus::Accepted);
        info!("Accepted revision {} on section {}", revision_id, section_id);
        StoreOutcome::Applied
    }

    pub fn reject_revision(&mut self, revision_id: &str) -> StoreOutcome {
        let Some(index) = self.pending_index(revision_id) else {
            warn!("Pending revision {} not found, reject ignored", revision_id);
            return StoreOutcome::Ignored;
        };

        self.resolve_pending(index, RevisionStatus::Rejected);
        info!("Rejected revision {}", revision_id);
        StoreOutcome::Applied
    }

    pub fn mark_sync(&mut self, revision_id: &str, sync: SyncState) -> StoreOutcome {
        let Some(revision) = self
            .pending_revisions
            .iter_mut()
            .chain(self.revisions.iter_mut())
            .find(|r| r.id == revision_id)
        else {
            return StoreOutcome::Ignored;
        };
        revision.sync = sync;
        StoreOutcome::Applied
    }

    /// Replaces both collections with `revisions` as-is.
    pub fn load_revisions(&mut self, revisions: Vec<SectionRevision>) {
        let (pending, resolved): (Vec<_>, Vec<_>) =
            revisions.into_iter().partition(SectionRevision::is_pending);
        debug!(
            "Loaded {} pending and {} resolved revisions",
            pending.len(),
            resolved.len()
        );
        self.pending_revisions = pending;
        self.revisions = resolved;
    }

    /// Merges a server snapshot into local state.
    ///
    /// Server copies win and become confirmed, except that a revision already
    /// resolved locally is never moved to a different status, and a known
    /// revision keeps the `original_text` captured when it was created.
    /// Local revisions missing from the snapshot are kept.
    pub fn reconcile(&mut self, server_revisions: Vec<SectionRevision>) {
        let mut local: HashMap<String, SectionRevision> = self
            .pending_revisions
            .drain(..)
            .chain(self.revisions.drain(..))
            .map(|r| (r.id.clone(), r))
            .collect();
        let mut local_order: Vec<String> = local.keys().cloned().collect();
        local_order.sort_by_key(|id| local.get(id).map(|r| r.created_at));

        let mut merged = Vec::with_capacity(server_revisions.len() + local.len());
        for mut incoming in server_revisions {
            incoming.sync = SyncState::Confirmed;
            match local.remove(&incoming.id) {
                Some(existing) if existing.status.is_terminal() && existing.status != incoming.status => {
                    warn!(
                        "Server reports revision {} as {}, keeping local {}",
                        existing.id, incoming.status, existing.status
                    );
                    merged.push(existing);
                }
                Some(existing) => {
                    if existing.is_pending() && incoming.status.is_terminal() {
                        info!("Revision {} was {} remotely", incoming.id, incoming.status);
                    }
                    incoming.original_text = existing.original_text;
                    merged.push(incoming);
                }
                None => merged.push(incoming),
            }
        }
        merged.extend(local_order.into_iter().filter_map(|id| local.remove(&id)));

        self.load_revisions(merged);
    }

    fn pending_index(&self, revision_id: &str) -> Option<usize> {
        self.pending_revisions.iter().position(|r| r.id == revision_id)
    }

    fn resolve_pending(&mut self, index: usize, status: RevisionStatus) {
        let mut revision = self.pending_revisions.remove(index);
        revision.resolve(status);
        self.revisions.push(revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample_document() -> Document {
        Document::new("doc-1", "Lease.pdf").with_sections(vec![
            DocumentSection::new("s1", "A").with_title("Rent"),
            DocumentSection::new("s2", "Pets are not allowed."),
        ])
    }

    fn store_with_document() -> RevisionStore {
        let mut store = RevisionStore::new("alice");
        store.set_current_document(Some(sample_document()));
        store
    }

    fn text_of(store: &RevisionStore, section_id: &str) -> String {
        store.section(section_id).unwrap().text.clone()
    }

    #[test]
    fn test_accept_applies_text_and_moves_to_history() {
        let mut store = store_with_document();
        let revision = store.propose_revision("s1", "B", false, None, None).unwrap();

        assert_eq!(store.accept_revision(&revision.id), StoreOutcome::Applied);

        assert_eq!(text_of(&store, "s1"), "B");
        assert!(store.pending_revisions().is_empty());
        let resolved = store.find_revision(&revision.id).unwrap();
        assert_eq!(resolved.status, RevisionStatus::Accepted);
        assert_eq!(resolved.original_text, "A");
    }

    #[test]
    fn test_reject_leaves_text_untouched() {
        let mut store = store_with_document();
        let revision = store.propose_revision("s1", "B", false, None, None).unwrap();

        assert_eq!(store.reject_revision(&revision.id), StoreOutcome::Applied);

        assert_eq!(text_of(&store, "s1"), "A");
        assert!(store.pending_revisions().is_empty());
        assert_eq!(store.revisions()[0].status, RevisionStatus::Rejected);
    }

    #[test]
    fn test_resolved_revision_cannot_be_resolved_again() {
        let mut store = store_with_document();
        let revision = store.propose_revision("s1", "B", false, None, None).unwrap();
        let _ = store.accept_revision(&revision.id);

        assert_eq!(store.reject_revision(&revision.id), StoreOutcome::Ignored);
        assert_eq!(store.accept_revision(&revision.id), StoreOutcome::Ignored);
        assert_eq!(store.revisions().len(), 1);
        assert_eq!(store.revisions()[0].status, RevisionStatus::Accepted);
    }

    #[test]
    fn test_concurrent_pending_revisions_are_independent() {
        let mut store = store_with_document();
        let first = store.propose_revision("s1", "B", true, None, None).unwrap();
        let second = store.propose_revision("s1", "C", false, None, None).unwrap();

        let _ = store.accept_revision(&first.id);

        let other = store.find_revision(&second.id).unwrap();
        assert_eq!(other.status, RevisionStatus::Pending);
        assert_eq!(other.proposed_text, "C");
        // original text is the snapshot taken at proposal time
        assert_eq!(other.original_text, "A");
        assert_eq!(text_of(&store, "s1"), "B");

        let _ = store.reject_revision(&second.id);
        assert_eq!(text_of(&store, "s1"), "B");
        assert_eq!(
            store.find_revision(&first.id).unwrap().status,
            RevisionStatus::Accepted
        );
    }

    #[test]
    fn test_direct_edit_records_accepted_audit_entry() {
        let mut store = store_with_document();

        assert!(store.update_document_section("s1", "Y", true).is_applied());

        assert_eq!(text_of(&store, "s1"), "Y");
        assert_eq!(store.revisions().len(), 1);
        let audit = &store.revisions()[0];
        assert_eq!(audit.status, RevisionStatus::Accepted);
        assert_eq!(audit.original_text, "A");
        assert_eq!(audit.proposed_text, "Y");
        assert_eq!(audit.created_by, "alice");
        assert_eq!(audit.document_id.as_deref(), Some("doc-1"));
    }

    #[test]
    fn test_update_without_audit_records_nothing() {
        let mut store = store_with_document();
        assert!(store.update_document_section("s1", "Y", false).is_applied());
        assert!(store.revisions().is_empty());
    }

    #[test]
    fn test_unknown_section_is_ignored() {
        let mut store = store_with_document();

        assert_eq!(
            store.update_document_section("missing", "Y", true),
            StoreOutcome::Ignored
        );
        assert!(store.propose_revision("missing", "Y", false, None, None).is_none());
        assert!(store.revisions().is_empty());
        assert!(store.pending_revisions().is_empty());
        assert!(store.highlighted_section().is_none());
    }

    #[test]
    fn test_propose_highlights_section_and_tags_author() {
        let mut store = store_with_document();
        let ai = store
            .propose_revision(
                "s2",
                "Small pets are allowed.",
                true,
                Some("Tenant friendly".to_string()),
                Some(RiskLevel::Medium),
            )
            .unwrap();

        assert_eq!(store.highlighted_section(), Some("s2"));
        assert_eq!(ai.created_by, AI_AUTHOR);
        assert_eq!(ai.risk_level, Some(RiskLevel::Medium));
        assert_eq!(ai.comment.as_deref(), Some("Tenant friendly"));

        let user = store.propose_revision("s1", "B", false, None, None).unwrap();
        assert_eq!(user.created_by, "alice");
        assert_eq!(store.highlighted_section(), Some("s1"));
    }

    #[test]
    fn test_document_replacement_clears_pending_and_highlight() {
        let mut store = store_with_document();
        let accepted = store.propose_revision("s1", "B", false, None, None).unwrap();
        let _ = store.accept_revision(&accepted.id);
        store.propose_revision("s2", "X", false, None, None).unwrap();

        store.set_current_document(Some(Document::new("doc-2", "Other.pdf")));

        assert!(store.pending_revisions().is_empty());
        assert!(store.highlighted_section().is_none());
        assert_eq!(store.revisions().len(), 1);
        assert_eq!(store.revisions_for_document("doc-1").count(), 1);
        assert_eq!(store.revisions_for_document("doc-2").count(), 0);
    }

    #[test]
    fn test_accept_against_missing_section_stays_pending() {
        let mut store = store_with_document();
        store.load_revisions(vec![SectionRevision::pending("gone", "A", "B", false, "bob")
            .with_id("rev-x")]);

        assert_eq!(store.accept_revision("rev-x"), StoreOutcome::Ignored);
        assert!(store.find_revision("rev-x").unwrap().is_pending());
    }

    #[test]
    fn test_loaded_scenario_accepts_by_revision_id() {
        let mut store = RevisionStore::default();
        store.set_current_document(Some(
            Document::new("doc-1", "Contract.pdf")
                .with_sections(vec![DocumentSection::new("section-1", "Original")]),
        ));
        store.load_revisions(vec![SectionRevision::pending(
            "section-1",
            "Original",
            "Proposed",
            false,
            "bob",
        )
        .with_id("rev-1")]);

        assert!(store.accept_revision("rev-1").is_applied());

        assert_eq!(text_of(&store, "section-1"), "Proposed");
        assert!(store.pending_revisions().iter().all(|r| r.id != "rev-1"));
        let resolved = store.revisions().iter().find(|r| r.id == "rev-1").unwrap();
        assert_eq!(resolved.status, RevisionStatus::Accepted);
    }

    #[test]
    fn test_reconcile_never_regresses_terminal_status() {
        let mut store = store_with_document();
        let revision = store.propose_revision("s1", "B", false, None, None).unwrap();
        let _ = store.accept_revision(&revision.id);
        let _ = store.mark_sync(&revision.id, SyncState::Tentative);

        // stale snapshot still shows the revision pending
        let stale = SectionRevision {
            original_text: "tampered".to_string(),
            ..revision.clone()
        };
        store.reconcile(vec![stale]);

        let kept = store.find_revision(&revision.id).unwrap();
        assert_eq!(kept.status, RevisionStatus::Accepted);
        assert_eq!(kept.sync, SyncState::Tentative);
        assert!(store.pending_revisions().is_empty());
    }

    #[test]
    fn test_reconcile_confirms_and_keeps_local_only_revisions() {
        let mut store = store_with_document();
        let local = store.propose_revision("s2", "X", false, None, None).unwrap();
        let _ = store.mark_sync(&local.id, SyncState::Tentative);

        let mut accepted_remotely = SectionRevision::pending("s1", "server copy", "B", true, AI_AUTHOR)
            .with_id("rev-remote")
            .with_created_at(Utc::now() - Duration::minutes(5));
        accepted_remotely.status = RevisionStatus::Accepted;
        store.reconcile(vec![accepted_remotely]);

        let remote = store.find_revision("rev-remote").unwrap();
        assert_eq!(remote.sync, SyncState::Confirmed);
        assert_eq!(remote.status, RevisionStatus::Accepted);

        let kept = store.find_revision(&local.id).unwrap();
        assert!(kept.is_pending());
        assert_eq!(kept.sync, SyncState::Tentative);
    }

    #[test]
    fn test_reconcile_keeps_local_original_text() {
        let mut store = store_with_document();
        let revision = store.propose_revision("s1", "B", false, None, None).unwrap();
        let _ = store.accept_revision(&revision.id);

        let mut server_copy = revision.clone();
        server_copy.status = RevisionStatus::Accepted;
        server_copy.original_text = "rewritten".to_string();
        store.reconcile(vec![server_copy]);

        let kept = store.find_revision(&revision.id).unwrap();
        assert_eq!(kept.original_text, "A");
        assert_eq!(kept.sync, SyncState::Confirmed);
    }
}
