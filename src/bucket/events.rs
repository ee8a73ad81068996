//! Bucket event notifications.
//!
//! State changes are reported through an [`EventSink`], decoupled from
//! persistence. No-op operations and failures produce no event.

use parking_lot::Mutex;
use primitive_types::U256;
use tokio::sync::broadcast;
use tracing::info;

use super::id::BucketId;

/// A state change on a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketEvent {
    Added {
        id: BucketId,
        limit: U256,
        duration: u64,
    },
    Removed {
        id: BucketId,
    },
    RateLimitUpdated {
        id: BucketId,
        limit: U256,
    },
    RateDurationUpdated {
        id: BucketId,
        duration: u64,
    },
    Consumed {
        id: BucketId,
        amount: U256,
    },
    /// `amount` is what was actually added after clamping to the limit
    Filled {
        id: BucketId,
        amount: U256,
    },
}

impl BucketEvent {
    /// The event's name.
    pub fn name(&self) -> &'static str {
        match self {
            BucketEvent::Added { .. } => "BucketAdded",
            BucketEvent::Removed { .. } => "BucketRemoved",
            BucketEvent::RateLimitUpdated { .. } => "BucketRateLimitUpdated",
            BucketEvent::RateDurationUpdated { .. } => "BucketRateDurationUpdated",
            BucketEvent::Consumed { .. } => "BucketConsumed",
            BucketEvent::Filled { .. } => "BucketFilled",
        }
    }

    /// The bucket the event concerns.
    pub fn bucket_id(&self) -> BucketId {
        match self {
            BucketEvent::Added { id, .. }
            | BucketEvent::Removed { id }
            | BucketEvent::RateLimitUpdated { id, .. }
            | BucketEvent::RateDurationUpdated { id, .. }
            | BucketEvent::Consumed { id, .. }
            | BucketEvent::Filled { id, .. } => *id,
        }
    }
}

/// Receiver of bucket events.
///
/// Events are delivered while the bucket they describe is still locked, so
/// implementations must not block or call back into the engine.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BucketEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &BucketEvent) {
        match event {
            BucketEvent::Added { id, limit, duration } => {
                info!(event = event.name(), bucket = %id, limit = %limit, duration, "Bucket event");
            }
            BucketEvent::Removed { id } => {
                info!(event = event.name(), bucket = %id, "Bucket event");
            }
            BucketEvent::RateLimitUpdated { id, limit } => {
                info!(event = event.name(), bucket = %id, limit = %limit, "Bucket event");
            }
            BucketEvent::RateDurationUpdated { id, duration } => {
                info!(event = event.name(), bucket = %id, duration, "Bucket event");
            }
            BucketEvent::Consumed { id, amount } | BucketEvent::Filled { id, amount } => {
                info!(event = event.name(), bucket = %id, amount = %amount, "Bucket event");
            }
        }
    }
}

/// Publishes events to any number of subscribers.
///
/// Events emitted while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<BucketEvent>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BucketEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: &BucketEvent) {
        // Err only means there are no subscribers
        let _ = self.sender.send(event.clone());
    }
}

/// Records events in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BucketEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far.
    pub fn events(&self) -> Vec<BucketEvent> {
        self.events.lock().clone()
    }

    /// Remove and return the recorded events.
    pub fn take(&self) -> Vec<BucketEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &BucketEvent) {
        self.events.lock().push(event.clone());
    }
}
