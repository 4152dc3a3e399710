//! Diagnostics for replay streams
//!
//! Boundary conditions are reported as structured events: one JSON line per
//! event through the `log` facade, so whatever logger the embedding decoder
//! installs can collect them.

use log::{debug, warn};
use serde::Serialize;

/// Diagnostic event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticEventType {
    /// Pending replay grew past the back buffer
    UnreadOverflow,
    /// Source returned fewer bytes than requested
    SourceExhausted,
}

/// Diagnostic event for logging
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    pub event_type: DiagnosticEventType,
    /// Pending replay count after the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_replay: Option<usize>,
    /// Bytes asked for by the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<usize>,
    /// Bytes actually delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
    /// Back buffer size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DiagnosticEvent {
    /// Create a new diagnostic event
    pub fn new(event_type: DiagnosticEventType) -> Self {
        Self {
            event_type,
            pending_replay: None,
            requested: None,
            delivered: None,
            capacity: None,
            reason: None,
        }
    }

    /// Set pending replay count
    pub fn with_pending_replay(mut self, pending: usize) -> Self {
        self.pending_replay = Some(pending);
        self
    }

    /// Set requested byte count
    pub fn with_requested(mut self, requested: usize) -> Self {
        self.requested = Some(requested);
        self
    }

    /// Set delivered byte count
    pub fn with_delivered(mut self, delivered: usize) -> Self {
        self.delivered = Some(delivered);
        self
    }

    /// Set back buffer size
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set reason
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                DiagnosticEventType::UnreadOverflow => warn!("[REPLAY-RING] {}", json),
                DiagnosticEventType::SourceExhausted => debug!("[REPLAY-RING] {}", json),
            },
            Err(e) => {
                warn!("Failed to serialize diagnostic event: {}", e);
            }
        }
    }
}

/// Unread pushed the pending replay count past the back buffer
pub fn unread_overflow(pending: usize, requested: usize, capacity: usize) -> DiagnosticEvent {
    DiagnosticEvent::new(DiagnosticEventType::UnreadOverflow)
        .with_pending_replay(pending)
        .with_requested(requested)
        .with_capacity(capacity)
        .with_reason(&format!(
            "{} bytes pending replay exceed back buffer of {}; {} replayed bytes will be stale",
            pending,
            capacity,
            pending.saturating_sub(capacity)
        ))
}

/// Source delivered less than asked for
pub fn source_exhausted(requested: usize, delivered: usize) -> DiagnosticEvent {
    DiagnosticEvent::new(DiagnosticEventType::SourceExhausted)
        .with_requested(requested)
        .with_delivered(delivered)
}
