//! CallStatus - Lifecycle state of an outbound call

use serde::{Deserialize, Serialize};

/// Status of a call as tracked by the orchestrator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    #[default]
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    Cancelled,
}

impl CallStatus {
    pub const TERMINAL: [CallStatus; 5] = [
        CallStatus::Completed,
        CallStatus::Failed,
        CallStatus::Busy,
        CallStatus::NoAnswer,
        CallStatus::Cancelled,
    ];

    /// Terminal statuses never transition again
    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    /// Position along the lifecycle; every terminal status shares the last rank
    pub fn rank(self) -> u8 {
        match self {
            CallStatus::Initiated => 0,
            CallStatus::Ringing => 1,
            CallStatus::InProgress => 2,
            _ => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Initiated => "initiated",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
            CallStatus::Busy => "busy",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Cancelled => "cancelled",
        }
    }

    /// Map the telephony gateway's status vocabulary (case-insensitive).
    ///
    /// Returns `None` for statuses with no counterpart in the call lifecycle.
    pub fn from_gateway(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "queued" | "initiated" => Some(CallStatus::Initiated),
            "ringing" => Some(CallStatus::Ringing),
            "in-progress" | "in_progress" | "answered" => Some(CallStatus::InProgress),
            "completed" => Some(CallStatus::Completed),
            "failed" => Some(CallStatus::Failed),
            "busy" => Some(CallStatus::Busy),
            "no-answer" | "no_answer" => Some(CallStatus::NoAnswer),
            "canceled" | "cancelled" => Some(CallStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(CallStatus::Initiated),
            "ringing" => Ok(CallStatus::Ringing),
            "in-progress" => Ok(CallStatus::InProgress),
            "completed" => Ok(CallStatus::Completed),
            "failed" => Ok(CallStatus::Failed),
            "busy" => Ok(CallStatus::Busy),
            "no-answer" => Ok(CallStatus::NoAnswer),
            "cancelled" => Ok(CallStatus::Cancelled),
            _ => Err(format!("Unknown call status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_mapping_is_case_insensitive() {
        assert_eq!(
            CallStatus::from_gateway("COMPLETED"),
            Some(CallStatus::Completed)
        );
        assert_eq!(
            CallStatus::from_gateway("In-Progress"),
            Some(CallStatus::InProgress)
        );
        assert_eq!(
            CallStatus::from_gateway("canceled"),
            Some(CallStatus::Cancelled)
        );
        assert_eq!(CallStatus::from_gateway("bogus"), None);
    }

    #[test]
    fn test_terminal_statuses_share_top_rank() {
        for status in CallStatus::TERMINAL {
            assert!(status.is_terminal());
            assert_eq!(status.rank(), 3);
        }
        assert!(!CallStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&CallStatus::NoAnswer).unwrap();
        assert_eq!(json, "\"no-answer\"");
        let parsed: CallStatus = "in-progress".parse().unwrap();
        assert_eq!(parsed, CallStatus::InProgress);
    }
}
