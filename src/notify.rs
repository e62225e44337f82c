use crate::events::{EventBus, IntakeEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Fire-and-forget delivery of user-facing toasts
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str, severity: Severity);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, body: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => info!(%title, "{}", body),
            Severity::Warning => warn!(%title, "{}", body),
            Severity::Error => error!(%title, "{}", body),
        }
    }
}

/// Republishes notifications on the event bus
pub struct EventBusNotifier {
    event_bus: Arc<EventBus>,
}

impl EventBusNotifier {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self { event_bus }
    }
}

impl Notifier for EventBusNotifier {
    fn notify(&self, title: &str, body: &str, severity: Severity) {
        let _ = self.event_bus.publish(IntakeEvent::Notification {
            title: title.to_string(),
            body: body.to_string(),
            severity,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, title: &str, body: &str, severity: Severity) {
        self.delivered.lock().push(Notification {
            title: title.to_string(),
            body: body.to_string(),
            severity,
        });
    }
}
