use crate::config::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Receives one call per user-initiated outcome
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);
}

/// Supplies the operating mode. Read once per controller call.
pub trait ModeProvider: Send + Sync {
    fn is_demo_mode(&self) -> bool;

    fn using_mock_data(&self) -> bool;

    /// Demo and mock-data sessions never touch the network.
    fn is_offline(&self) -> bool {
        self.is_demo_mode() || self.using_mock_data()
    }
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Success => info!(target: "redline::notify", "{}", message),
            NotificationLevel::Error => error!(target: "redline::notify", "{}", message),
        }
    }
}

/// Mode flags that can be flipped at runtime, e.g. by a "try the demo" toggle
#[derive(Debug, Default)]
pub struct ModeFlags {
    demo_mode: AtomicBool,
    mock_data: AtomicBool,
}

impl ModeFlags {
    pub fn new(demo_mode: bool, mock_data: bool) -> Self {
        ModeFlags {
            demo_mode: AtomicBool::new(demo_mode),
            mock_data: AtomicBool::new(mock_data),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        ModeFlags::new(config.demo_mode, config.use_mock_data)
    }

    pub fn set_demo_mode(&self, enabled: bool) {
        self.demo_mode.store(enabled, Ordering::SeqCst);
    }

    pub fn set_mock_data(&self, enabled: bool) {
        self.mock_data.store(enabled, Ordering::SeqCst);
    }
}

impl ModeProvider for ModeFlags {
    fn is_demo_mode(&self) -> bool {
        self.demo_mode.load(Ordering::SeqCst)
    }

    fn using_mock_data(&self) -> bool {
        self.mock_data.load(Ordering::SeqCst)
    }
}
