use crate::models::DocumentSection;
use serde::{Deserialize, Serialize};

/// Structured content extracted from the uploaded file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedContent {
    #[serde(default)]
    pub sections: Vec<DocumentSection>,
}

/// Represents a document under review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_content: Option<ParsedContent>,
}

impl Document {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            name: name.into(),
            parsed_content: None,
        }
    }

    pub fn with_sections(mut self, sections: Vec<DocumentSection>) -> Self {
        self.parsed_content = Some(ParsedContent { sections });
        self
    }

    /// Sections in document order; empty when the file has not been parsed.
    pub fn sections(&self) -> &[DocumentSection] {
        self.parsed_content
            .as_ref()
            .map(|content| content.sections.as_slice())
            .unwrap_or(&[])
    }

    pub fn section(&self, section_id: &str) -> Option<&DocumentSection> {
        self.sections().iter().find(|s| s.id == section_id)
    }

    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut DocumentSection> {
        self.parsed_content
            .as_mut()?
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
    }
}
