//! Turns user intent into store mutations, going through the server first
//! when the session is networked.
//!
//! Networked accept/reject runs in three steps: submit to the server, apply
//! the same transition locally (the revision is then `Tentative`), and
//! re-fetch the document's revisions to reconcile (`Confirmed`). A failed
//! submit leaves the store untouched.

use crate::collab::{ModeFlags, ModeProvider, NotificationLevel, Notifier, TracingNotifier};
use crate::config::Config;
use crate::database::Journal;
use crate::editing::SectionEditor;
use crate::error::{Result, RevisionError};
use crate::models::{Document, RiskLevel, SectionRevision, SyncState};
use crate::remote::{create_api, RevisionApi};
use crate::store::{lock, RevisionStore, SharedStore, StoreOutcome};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    fn apply(self, store: &mut RevisionStore, revision_id: &str) -> StoreOutcome {
        match self {
            Resolution::Accept => store.accept_revision(revision_id),
            Resolution::Reject => store.reject_revision(revision_id),
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            Resolution::Accept => "Revision accepted",
            Resolution::Reject => "Revision rejected",
        }
    }
}

/// Marks a revision as in flight until dropped
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    revision_id: String,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, revision_id: &str) -> Option<Self> {
        if !locked(set).insert(revision_id.to_string()) {
            return None;
        }
        Some(InFlight {
            set,
            revision_id: revision_id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        locked(self.set).remove(&self.revision_id);
    }
}

pub struct RevisionController {
    store: SharedStore,
    api: Arc<dyn RevisionApi>,
    mode: Arc<dyn ModeProvider>,
    notifier: Arc<dyn Notifier>,
    journal: Option<Arc<Journal>>,
    in_flight: Mutex<HashSet<String>>,
    last_error: Mutex<Option<String>>,
    editor: Mutex<SectionEditor>,
}

impl RevisionController {
    pub fn new(
        store: SharedStore,
        api: Arc<dyn RevisionApi>,
        mode: Arc<dyn ModeProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        RevisionController {
            store,
            api,
            mode,
            notifier,
            journal: None,
            in_flight: Mutex::new(HashSet::new()),
            last_error: Mutex::new(None),
            editor: Mutex::new(SectionEditor::default()),
        }
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Builds a fresh session from configuration: its own store, the HTTP
    /// client, mode flags, log notifications and the journal if enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = RevisionStore::new(config.actor.clone()).shared();
        let api = create_api(config)?;
        let controller = RevisionController::new(
            store,
            api,
            Arc::new(ModeFlags::from_config(config)),
            Arc::new(TracingNotifier),
        );

        match config.resolved_journal_path()? {
            Some(path) => {
                let journal = Journal::open(&path)?;
                Ok(controller.with_journal(Arc::new(journal)))
            }
            None => Ok(controller),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn is_processing(&self, revision_id: &str) -> bool {
        locked(&self.in_flight).contains(revision_id)
    }

    pub fn processing_ids(&self) -> Vec<String> {
        locked(&self.in_flight).iter().cloned().collect()
    }

    pub fn last_error(&self) -> Option<String> {
        locked(&self.last_error).clone()
    }

    pub fn clear_error(&self) {
        *locked(&self.last_error) = None;
    }

    /// Replaces the loaded document and drops any in-progress edits.
    pub fn set_document(&self, document: Option<Document>) {
        lock(&self.store).set_current_document(document);
        locked(&self.editor).clear();
    }

    /// Loads the current document's revisions from the server, or from the
    /// journal in demo mode. Returns how many revisions the document now has.
    pub async fn load_revisions(&self) -> Result<usize> {
        let document_id = self.require_document()?;

        if self.mode.is_offline() {
            if let Some(journal) = &self.journal {
                let revisions = journal
                    .load_document(&document_id)
                    .map_err(|e| self.fail(e))?;
                lock(&self.store).reconcile(revisions);
            }
        } else {
            let revisions = self
                .api
                .get_revisions_by_document(&document_id)
                .await
                .map_err(|e| self.fail(e))?;
            lock(&self.store).reconcile(revisions);
        }

        let count = lock(&self.store).revisions_for_document(&document_id).count();
        debug!("Document {} has {} revisions", document_id, count);
        Ok(count)
    }

    pub async fn accept_revision(&self, revision_id: &str) -> Result<StoreOutcome> {
        self.resolve(revision_id, Resolution::Accept).await
    }

    pub async fn reject_revision(&self, revision_id: &str) -> Result<StoreOutcome> {
        self.resolve(revision_id, Resolution::Reject).await
    }

    async fn resolve(&self, revision_id: &str, action: Resolution) -> Result<StoreOutcome> {
        if revision_id.trim().is_empty() {
            return Err(self.fail(RevisionError::Validation(
                "A revision id is required".to_string(),
            )));
        }
        let document_id = self.require_document()?;
        let offline = self.mode.is_offline();

        // Held through the pending check so two submits cannot both pass it
        let _marker = if offline {
            None
        } else {
            match InFlight::acquire(&self.in_flight, revision_id) {
                Some(marker) => Some(marker),
                None => return Err(self.fail(RevisionError::Busy(revision_id.to_string()))),
            }
        };

        let is_pending = lock(&self.store)
            .find_revision(revision_id)
            .map(SectionRevision::is_pending);
        match is_pending {
            None => {
                warn!("Revision {} is not loaded, {:?} ignored", revision_id, action);
                return Ok(StoreOutcome::Ignored);
            }
            Some(false) => {
                warn!("Revision {} is already resolved, {:?} ignored", revision_id, action);
                return Ok(StoreOutcome::Ignored);
            }
            Some(true) => {}
        }

        if offline {
            let outcome = action.apply(&mut lock(&self.store), revision_id);
            if outcome.is_applied() {
                self.journal_revision(revision_id);
                self.succeed(action.success_message());
            }
            return Ok(outcome);
        }

        info!("Submitting {:?} for revision {}", action, revision_id);
        let submitted = match action {
            Resolution::Accept => self.api.accept_revision(revision_id).await,
            Resolution::Reject => self.api.reject_revision(revision_id).await,
        };
        if let Err(err) = submitted {
            return Err(self.fail(err));
        }

        let outcome = {
            let mut store = lock(&self.store);
            let outcome = action.apply(&mut store, revision_id);
            if outcome.is_applied() {
                let _ = store.mark_sync(revision_id, SyncState::Tentative);
            } else {
                warn!(
                    "Server confirmed {:?} of {} but the local copy changed meanwhile",
                    action, revision_id
                );
            }
            outcome
        };

        self.refresh(&document_id).await;
        self.succeed(action.success_message());
        Ok(outcome)
    }

    /// Re-fetches the document's revisions after a confirmed submit. Failure
    /// leaves the local state tentative and is not reported as an error.
    async fn refresh(&self, document_id: &str) {
        match self.api.get_revisions_by_document(document_id).await {
            Ok(revisions) => {
                debug!("Reconciling {} revisions for {}", revisions.len(), document_id);
                lock(&self.store).reconcile(revisions);
            }
            Err(err) => warn!("Failed to refresh revisions for {}: {}", document_id, err),
        }
    }

    /// Records a pending revision against a section of the current document.
    ///
    /// Proposals are always local; in networked mode they stay tentative.
    /// Returns `Ok(None)` if the section does not exist.
    pub fn propose_revision(
        &self,
        section_id: &str,
        proposed_text: &str,
        ai_generated: bool,
        comment: Option<String>,
        risk_level: Option<RiskLevel>,
    ) -> Result<Option<SectionRevision>> {
        self.require_document()?;
        let offline = self.mode.is_offline();

        let proposed = {
            let mut store = lock(&self.store);
            let proposed =
                store.propose_revision(section_id, proposed_text, ai_generated, comment, risk_level);
            match proposed {
                Some(revision) if !offline => {
                    let _ = store.mark_sync(&revision.id, SyncState::Tentative);
                    Some(revision.with_sync(SyncState::Tentative))
                }
                other => other,
            }
        };

        if let Some(revision) = &proposed {
            if offline {
                self.journal_revision(&revision.id);
            }
            self.succeed(if ai_generated {
                "AI suggestion added"
            } else {
                "Revision proposed"
            });
        }
        Ok(proposed)
    }

    pub fn start_editing(&self, section_id: &str) -> StoreOutcome {
        let current_text = lock(&self.store).section(section_id).map(|s| s.text.clone());
        match current_text {
            Some(text) => {
                locked(&self.editor).start(section_id, &text);
                StoreOutcome::Applied
            }
            None => {
                warn!("Section {} not found, cannot start editing", section_id);
                StoreOutcome::Ignored
            }
        }
    }

    pub fn update_draft(&self, section_id: &str, text: &str) -> bool {
        locked(&self.editor).update_draft(section_id, text)
    }

    pub fn cancel_editing(&self, section_id: &str) {
        locked(&self.editor).take_draft(section_id);
    }

    /// Writes the draft straight to the section as an already accepted edit.
    pub fn save_edit(&self, section_id: &str) -> StoreOutcome {
        let Some(draft) = locked(&self.editor).take_draft(section_id) else {
            debug!("No draft for section {}", section_id);
            return StoreOutcome::Ignored;
        };
        self.apply_direct_edit(section_id, &draft)
    }

    /// Stages a proposal for the section without touching its text.
    pub fn propose_edit(&self, section_id: &str, proposed_text: &str) -> StoreOutcome {
        if lock(&self.store).section(section_id).is_none() {
            warn!("Section {} not found, edit not staged", section_id);
            return StoreOutcome::Ignored;
        }
        locked(&self.editor).stage(section_id, proposed_text);
        StoreOutcome::Applied
    }

    /// Applies the staged proposal. Does nothing when none is staged.
    pub fn accept_edit(&self, section_id: &str) -> StoreOutcome {
        let Some(proposed) = locked(&self.editor).take_proposal(section_id) else {
            debug!("No staged edit for section {}", section_id);
            return StoreOutcome::Ignored;
        };
        self.apply_direct_edit(section_id, &proposed)
    }

    /// Discards the staged proposal; the section text is untouched.
    pub fn reject_edit(&self, section_id: &str) -> StoreOutcome {
        match locked(&self.editor).take_proposal(section_id) {
            Some(_) => StoreOutcome::Applied,
            None => StoreOutcome::Ignored,
        }
    }

    pub fn staged_edit(&self, section_id: &str) -> Option<String> {
        locked(&self.editor).staged_proposal(section_id).map(str::to_string)
    }

    pub fn draft(&self, section_id: &str) -> Option<String> {
        locked(&self.editor).draft(section_id).map(str::to_string)
    }

    fn apply_direct_edit(&self, section_id: &str, text: &str) -> StoreOutcome {
        let audit_id = {
            let mut store = lock(&self.store);
            match store.update_document_section(section_id, text, true) {
                StoreOutcome::Applied => store.revisions().last().map(|r| r.id.clone()),
                StoreOutcome::Ignored => return StoreOutcome::Ignored,
            }
        };
        if self.mode.is_offline() {
            if let Some(id) = audit_id {
                self.journal_revision(&id);
            }
        }
        StoreOutcome::Applied
    }

    fn require_document(&self) -> Result<String> {
        let document_id = lock(&self.store).current_document_id().map(str::to_string);
        document_id.ok_or_else(|| {
            self.fail(RevisionError::Validation("No document is loaded".to_string()))
        })
    }

    fn journal_revision(&self, revision_id: &str) {
        let Some(journal) = &self.journal else {
            return;
        };
        let Some(revision) = lock(&self.store).find_revision(revision_id).cloned() else {
            return;
        };
        if let Err(err) = journal.record(&revision) {
            error!("Failed to journal revision {}: {}", revision_id, err);
        }
    }

    fn succeed(&self, message: &str) {
        self.clear_error();
        self.notifier.notify(NotificationLevel::Success, message);
    }

    fn fail(&self, err: RevisionError) -> RevisionError {
        warn!("Revision operation failed: {}", err);
        let message = err.user_message();
        *locked(&self.last_error) = Some(message.clone());
        self.notifier.notify(NotificationLevel::Error, &message);
        err
    }
}
