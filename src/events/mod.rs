//! Submission lifecycle events
//!
//! Emitted by the orchestrator after each failed attempt and once an
//! orchestration ends, for subscribers that want to react to a confirmed claim.

use crate::tx::AttemptStage;

use chrono::{DateTime, Utc};
use ethers::types::H256;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted while submitting a transaction
#[derive(Debug, Clone, Serialize)]
pub enum SubmissionEvent {
    /// One attempt failed; another may follow
    AttemptFailed {
        submission_id: Uuid,
        attempt: u32,
        stage: AttemptStage,
        error: String,
    },

    /// Receipt obtained
    Confirmed {
        submission_id: Uuid,
        chain_id: u64,
        tx_hash: H256,
        block_number: Option<u64>,
        attempts: u32,
        confirmed_at: DateTime<Utc>,
    },

    /// Orchestration gave up
    Failed {
        submission_id: Uuid,
        chain_id: u64,
        attempts: u32,
        error: String,
    },
}

impl SubmissionEvent {
    /// Get event name
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionEvent::AttemptFailed { .. } => "AttemptFailed",
            SubmissionEvent::Confirmed { .. } => "Confirmed",
            SubmissionEvent::Failed { .. } => "Failed",
        }
    }

    pub fn submission_id(&self) -> Uuid {
        match self {
            SubmissionEvent::AttemptFailed { submission_id, .. }
            | SubmissionEvent::Confirmed { submission_id, .. }
            | SubmissionEvent::Failed { submission_id, .. } => *submission_id,
        }
    }
}

/// Fan-out of submission events to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SubmissionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SubmissionEvent) {
        // No receivers, that's okay
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(SubmissionEvent::Failed {
            submission_id: Uuid::new_v4(),
            chain_id: 1,
            attempts: 1,
            error: "boom".to_string(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.emit(SubmissionEvent::AttemptFailed {
            submission_id: id,
            attempt: 0,
            stage: AttemptStage::Submitted,
            error: "timeout".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "AttemptFailed");
        assert_eq!(event.submission_id(), id);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["AttemptFailed"]["stage"], "Submitted");
    }
}
