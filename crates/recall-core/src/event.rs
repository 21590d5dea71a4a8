//! Change-event envelopes emitted by the source-of-truth store.
//!
//! Delivery is at-least-once and may arrive out of order; consumers must be
//! idempotent per item id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of mutation that produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("{event_type} event carries no record")]
    MissingRecord { event_type: EventType },
}

/// Envelope for one change on one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct ChangeEvent<T> {
    pub event_type: EventType,
    #[serde(default)]
    pub record: Option<T>,
    #[serde(default)]
    pub previous_record: Option<T>,
}

impl<T> ChangeEvent<T> {
    pub fn create(record: T) -> Self {
        Self {
            event_type: EventType::Create,
            record: Some(record),
            previous_record: None,
        }
    }

    pub fn update(previous: T, record: T) -> Self {
        Self {
            event_type: EventType::Update,
            record: Some(record),
            previous_record: Some(previous),
        }
    }

    pub fn delete(previous: T) -> Self {
        Self {
            event_type: EventType::Delete,
            record: None,
            previous_record: Some(previous),
        }
    }

    /// The current state of the item (Create/Update).
    pub fn current(&self) -> Result<&T, EventError> {
        self.record.as_ref().ok_or(EventError::MissingRecord {
            event_type: self.event_type,
        })
    }

    /// The item the event is about. Delete events may carry the removed row in
    /// either slot depending on the emitter.
    pub fn subject(&self) -> Result<&T, EventError> {
        self.record
            .as_ref()
            .or(self.previous_record.as_ref())
            .ok_or(EventError::MissingRecord {
                event_type: self.event_type,
            })
    }
}
