use crate::error::EventBusError;
use crate::notify::Severity;
use crate::pipeline::PipelineStatus;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Events emitted while acquiring photos and measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IntakeEvent {
    /// The observable pipeline status changed
    StatusChanged {
        submission: u64,
        status: PipelineStatus,
    },
    /// A camera stream was opened
    StreamAcquired {
        handle_id: u64,
        timestamp: SystemTime,
    },
    /// A camera stream was released
    StreamReleased {
        handle_id: u64,
        timestamp: SystemTime,
    },
    /// A profile record was upserted
    ProfileUpdated { user_id: String, fields: Vec<String> },
    /// A user-facing notification
    Notification {
        title: String,
        body: String,
        severity: Severity,
    },
}

impl IntakeEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            IntakeEvent::StatusChanged { submission, status } => {
                format!("Submission {} is {}", submission, status.label())
            }
            IntakeEvent::StreamAcquired { handle_id, .. } => {
                format!("Camera stream {} acquired", handle_id)
            }
            IntakeEvent::StreamReleased { handle_id, .. } => {
                format!("Camera stream {} released", handle_id)
            }
            IntakeEvent::ProfileUpdated { user_id, fields } => {
                format!("Profile {} updated ({})", user_id, fields.join(", "))
            }
            IntakeEvent::Notification { title, body, .. } => {
                format!("{}: {}", title, body)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            IntakeEvent::StatusChanged { .. } => "status_changed",
            IntakeEvent::StreamAcquired { .. } => "stream_acquired",
            IntakeEvent::StreamReleased { .. } => "stream_released",
            IntakeEvent::ProfileUpdated { .. } => "profile_updated",
            IntakeEvent::Notification { .. } => "notification",
        }
    }
}

/// Broadcast bus for intake events
pub struct EventBus {
    sender: broadcast::Sender<IntakeEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Publishing with no subscribers is reported as an error; most callers ignore it.
    pub fn publish(&self, event: IntakeEvent) -> Result<usize, EventBusError> {
        trace!("Publishing event: {}", event.description());

        if let IntakeEvent::ProfileUpdated { user_id, fields } = &event {
            info!("Profile {} updated: {}", user_id, fields.join(", "));
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    Custom(fn(&IntakeEvent) -> bool),
}

impl EventFilter {
    pub fn matches(&self, event: &IntakeEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<IntakeEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<IntakeEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<IntakeEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain every event that is already queued and passes the filter
    pub fn drain(&mut self) -> Result<Vec<IntakeEvent>, EventBusError> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        events.push(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(events),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
