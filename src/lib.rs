pub mod collab;
pub mod config;
pub mod controller;
pub mod database;
pub mod editing;
mod error;
pub mod logger;
pub mod models;
pub mod panel;
pub mod remote;
pub mod store;

pub use error::{Result, RevisionError};

pub use collab::{ModeFlags, ModeProvider, NotificationLevel, Notifier, TracingNotifier};
pub use controller::RevisionController;
pub use panel::{CategoryFilter, PanelTab, PanelViewModel, RevisionCounts, RevisionGroup};
pub use store::{RevisionStore, SharedStore, StoreOutcome};
