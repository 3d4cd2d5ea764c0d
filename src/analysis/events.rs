//! Stage-transition events
//!
//! The pipeline reports progress by emitting an event whenever a stage
//! changes status. Subscribers receive every event synchronously.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Status of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

/// One entry of the stage list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub status: StageStatus,
    pub description: String,
}

impl Stage {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StageStatus::Pending,
            description: String::new(),
        }
    }
}

/// Events emitted while a run progresses
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A stage changed status
    StageChanged {
        run_id: String,
        index: usize,
        stage: Stage,
    },
    /// The run ended
    RunFinished {
        run_id: String,
        success: bool,
        label_count: usize,
    },
}

/// A timestamped pipeline event
#[derive(Debug, Clone)]
pub struct TimestampedEvent {
    /// The event
    pub event: PipelineEvent,
    /// When it occurred
    pub timestamp: Instant,
}

type Subscriber = Box<dyn Fn(&TimestampedEvent) + Send + Sync>;

/// Event emitter for broadcasting pipeline events
#[derive(Clone, Default)]
pub struct EventEmitter {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventEmitter {
    /// Create a new event emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every future event
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&TimestampedEvent) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Box::new(callback));
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: PipelineEvent) {
        let stamped = TimestampedEvent {
            event,
            timestamp: Instant::now(),
        };
        for subscriber in self.subscribers.read().iter() {
            subscriber(&stamped);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
