//! CallEvent - Append-only audit trail of a call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::services::agent::DecisionSource;
use crate::domain::value_objects::{CallStatus, NextAction};

/// Which gateway callback an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    Connected,
    SpeechGathered,
    Status,
}

/// Closed set of audit event kinds, each with its own payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CallEventKind {
    AiMessagePrepared {
        message: String,
    },
    CallFailed {
        error: String,
    },
    CallAnswered {
        opening_line: String,
        fallback: bool,
    },
    UserInput {
        speech: String,
    },
    AiResponse {
        message: String,
        should_continue: bool,
        next_action: NextAction,
        source: DecisionSource,
    },
    StatusUpdate {
        reported_status: String,
        mapped_status: Option<CallStatus>,
        duration_secs: Option<i32>,
        credits_charged: Option<i32>,
        applied: bool,
        /// Set when the usage charge could not be committed; a redelivery retries it
        #[serde(default, skip_serializing_if = "Option::is_none")]
        billing_error: Option<String>,
    },
    CallEndedByUser {
        gateway_error: Option<String>,
    },
    CallbackIgnored {
        callback: CallbackKind,
        status: CallStatus,
    },
    CallbackFailed {
        callback: CallbackKind,
        error: String,
    },
}

impl CallEventKind {
    /// Stable name used for storage and filtering
    pub fn name(&self) -> &'static str {
        match self {
            Self::AiMessagePrepared { .. } => "ai_message_prepared",
            Self::CallFailed { .. } => "call_failed",
            Self::CallAnswered { .. } => "call_answered",
            Self::UserInput { .. } => "user_input",
            Self::AiResponse { .. } => "ai_response",
            Self::StatusUpdate { .. } => "status_update",
            Self::CallEndedByUser { .. } => "call_ended_by_user",
            Self::CallbackIgnored { .. } => "callback_ignored",
            Self::CallbackFailed { .. } => "callback_failed",
        }
    }
}

/// CallEvent - One audit record; never mutated or deleted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEvent {
    pub id: Uuid,
    pub call_id: Uuid,
    pub event: CallEventKind,
    pub created_at: DateTime<Utc>,
}

impl CallEvent {
    pub fn new(call_id: Uuid, event: CallEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            call_id,
            event,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.event.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = CallEventKind::UserInput {
            speech: "yes that time works".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "user_input");
        assert_eq!(value["data"]["speech"], "yes that time works");
        assert_eq!(event.name(), "user_input");
    }

    #[test]
    fn test_status_update_without_billing_error_reads_back() {
        let stored = serde_json::json!({
            "kind": "status_update",
            "data": {
                "reported_status": "completed",
                "mapped_status": "completed",
                "duration_secs": 61,
                "credits_charged": 2,
                "applied": true
            }
        });
        let event: CallEventKind = serde_json::from_value(stored).unwrap();
        assert!(matches!(
            event,
            CallEventKind::StatusUpdate {
                billing_error: None,
                credits_charged: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_callback_failed_payload() {
        let event = CallEventKind::CallbackFailed {
            callback: CallbackKind::SpeechGathered,
            error: "Repository error: connection reset".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "callback_failed");
        assert_eq!(value["data"]["callback"], "speech_gathered");
        assert_eq!(event.name(), "callback_failed");
    }
}
