mod document;
mod revision;
mod section;

pub use document::{Document, ParsedContent};
pub use revision::{RevisionAck, RevisionStatus, RiskLevel, SectionRevision, SyncState, AI_AUTHOR};
pub use section::DocumentSection;
