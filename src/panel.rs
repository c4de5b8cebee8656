//! Read-only views for the revision side panel.

use crate::controller::RevisionController;
use crate::models::{RevisionStatus, SectionRevision};
use crate::store::lock;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelTab {
    #[default]
    Pending,
    History,
}

impl PanelTab {
    fn includes(self, status: RevisionStatus) -> bool {
        match self {
            PanelTab::Pending => status == RevisionStatus::Pending,
            PanelTab::History => status.is_terminal(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    Ai,
    User,
}

impl CategoryFilter {
    fn includes(self, revision: &SectionRevision) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Ai => revision.ai_generated,
            CategoryFilter::User => !revision.ai_generated,
        }
    }
}

/// Revisions of one section, as shown under a single heading
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionGroup {
    pub section_id: String,
    pub section_title: Option<String>,
    pub revisions: Vec<SectionRevision>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevisionCounts {
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
}

pub struct PanelViewModel {
    controller: Arc<RevisionController>,
    tab: PanelTab,
    filter: CategoryFilter,
}

impl PanelViewModel {
    pub fn new(controller: Arc<RevisionController>) -> Self {
        PanelViewModel {
            controller,
            tab: PanelTab::default(),
            filter: CategoryFilter::default(),
        }
    }

    pub fn tab(&self) -> PanelTab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: PanelTab) {
        self.tab = tab;
    }

    pub fn filter(&self) -> CategoryFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: CategoryFilter) {
        self.filter = filter;
    }

    /// Revisions on the active tab matching the category filter, newest first.
    pub fn filtered_revisions(&self) -> Vec<SectionRevision> {
        let store = lock(self.controller.store());
        let mut revisions: Vec<SectionRevision> = store
            .all_revisions()
            .filter(|r| self.tab.includes(r.status) && self.filter.includes(r))
            .cloned()
            .collect();
        revisions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        revisions
    }

    /// Filtered revisions bucketed by section, in order of each section's
    /// newest revision.
    pub fn revision_groups(&self) -> Vec<RevisionGroup> {
        let revisions = self.filtered_revisions();
        let store = lock(self.controller.store());

        let mut groups: Vec<RevisionGroup> = Vec::new();
        for revision in revisions {
            match groups.iter_mut().find(|g| g.section_id == revision.section_id) {
                Some(group) => group.revisions.push(revision),
                None => groups.push(RevisionGroup {
                    section_title: store
                        .section(&revision.section_id)
                        .and_then(|s| s.title.clone()),
                    section_id: revision.section_id.clone(),
                    revisions: vec![revision],
                }),
            }
        }
        groups
    }

    /// Counts over every revision, regardless of tab or filter.
    pub fn counts(&self) -> RevisionCounts {
        let store = lock(self.controller.store());
        store
            .all_revisions()
            .fold(RevisionCounts::default(), |mut counts, r| {
                match r.status {
                    RevisionStatus::Pending => counts.pending += 1,
                    RevisionStatus::Accepted => counts.accepted += 1,
                    RevisionStatus::Rejected => counts.rejected += 1,
                }
                counts
            })
    }

    pub fn highlighted_section(&self) -> Option<String> {
        lock(self.controller.store())
            .highlighted_section()
            .map(str::to_string)
    }

    pub fn handle_revision_click(&self, section_id: &str) {
        lock(self.controller.store()).set_highlighted_section(Some(section_id.to_string()));
    }

    /// Whether the accept/reject controls of a revision should be disabled.
    pub fn is_processing(&self, revision_id: &str) -> bool {
        self.controller.is_processing(revision_id)
    }

    pub fn last_error(&self) -> Option<String> {
        self.controller.last_error()
    }
}
