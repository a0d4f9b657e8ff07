//! Observable session state.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Peer connection state, mirrored verbatim from the transport.
///
/// `Closed` doubles as the resting state when no session exists.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    #[default]
    Closed,
}

/// Audio-reactive intensity levels (0.0 to 1.0).
pub mod intensity {
    pub const IDLE: f32 = 0.0;
    pub const LOW: f32 = 0.15;
    pub const USER_SPEAKING: f32 = 0.8;

    /// Level for an assistant transcript delta: varies with the delta text
    /// within `[0.5, 1.0)` so visuals do not look static.
    pub fn for_delta(delta: &str) -> f32 {
        let seed = delta
            .bytes()
            .fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        0.5 + (seed % 50) as f32 / 100.0
    }
}

/// UI-facing snapshot of conversation progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveState {
    pub user_transcript: String,
    pub assistant_response: String,
    pub is_assistant_speaking: bool,
    pub is_user_speaking: bool,
    pub intensity: f32,
}

/// The assistant response whose streaming deltas are currently authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseCursor {
    pub response_id: Option<String>,
    pub accumulated_text: String,
}

impl ResponseCursor {
    /// Start tracking a new response, discarding accumulated text.
    pub fn reset(&mut self, response_id: Option<String>) {
        self.response_id = response_id;
        self.accumulated_text.clear();
    }

    /// Whether a frame tagged with `response_id` belongs to the current response.
    ///
    /// Frames without an id, or arriving before any response was created,
    /// never match.
    pub fn accepts(&self, response_id: Option<&str>) -> bool {
        match (self.response_id.as_deref(), response_id) {
            (Some(current), Some(incoming)) => current == incoming,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventDirection {
    Inbound,
    Outbound,
}

/// One frame observed on the data channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLogEntry {
    pub direction: EventDirection,
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Bounded ring of recent frames; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub(crate) struct EventLog {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
}

impl EventLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub(crate) fn record(&mut self, direction: EventDirection, event_type: &str, payload: Value) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(EventLogEntry {
            direction,
            event_type: event_type.to_string(),
            payload,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<EventLogEntry> {
        self.entries.iter().cloned().collect()
    }
}
