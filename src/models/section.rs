use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents a section within a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub page_number: u32,
    /// Layout rectangle from the document provider, carried through as-is
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub position: Value,
}

impl DocumentSection {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        DocumentSection {
            id: id.into(),
            title: None,
            text: text.into(),
            page_number: 1,
            position: Value::Null,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
