use std::collections::HashMap;

/// Local editing state of one section. Nothing here is authoritative until
/// it is written through the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionEdit {
    pub draft: Option<String>,
    pub proposed_text: Option<String>,
}

impl SectionEdit {
    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    fn is_idle(&self) -> bool {
        self.draft.is_none() && self.proposed_text.is_none()
    }
}

/// Per-section editing view, keyed by section id
#[derive(Debug, Default)]
pub struct SectionEditor {
    edits: HashMap<String, SectionEdit>,
}

impl SectionEditor {
    pub fn get(&self, section_id: &str) -> Option<&SectionEdit> {
        self.edits.get(section_id)
    }

    pub fn staged_proposal(&self, section_id: &str) -> Option<&str> {
        self.edits.get(section_id)?.proposed_text.as_deref()
    }

    pub fn draft(&self, section_id: &str) -> Option<&str> {
        self.edits.get(section_id)?.draft.as_deref()
    }

    pub fn start(&mut self, section_id: &str, current_text: &str) {
        self.edits.entry(section_id.to_string()).or_default().draft = Some(current_text.to_string());
    }

    /// Returns false if the section is not being edited.
    pub fn update_draft(&mut self, section_id: &str, text: &str) -> bool {
        match self.edits.get_mut(section_id) {
            Some(edit) if edit.is_editing() => {
                edit.draft = Some(text.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn take_draft(&mut self, section_id: &str) -> Option<String> {
        let draft = self.edits.get_mut(section_id)?.draft.take();
        self.prune(section_id);
        draft
    }

    pub fn stage(&mut self, section_id: &str, proposed_text: &str) {
        self.edits.entry(section_id.to_string()).or_default().proposed_text =
            Some(proposed_text.to_string());
    }

    pub fn take_proposal(&mut self, section_id: &str) -> Option<String> {
        let proposal = self.edits.get_mut(section_id)?.proposed_text.take();
        self.prune(section_id);
        proposal
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }

    fn prune(&mut self, section_id: &str) {
        if self.edits.get(section_id).is_some_and(SectionEdit::is_idle) {
            self.edits.remove(section_id);
        }
    }
}
