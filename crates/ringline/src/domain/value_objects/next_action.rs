//! NextAction - What the agent wants the gateway to do after speaking

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NextAction {
    /// Keep the line open and gather more speech
    #[default]
    Listen,
    /// End the call
    Hangup,
    /// Hand the caller off to a human (ends the automated conversation)
    Transfer,
}

impl std::fmt::Display for NextAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextAction::Listen => write!(f, "listen"),
            NextAction::Hangup => write!(f, "hangup"),
            NextAction::Transfer => write!(f, "transfer"),
        }
    }
}

impl std::str::FromStr for NextAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "listen" => Ok(NextAction::Listen),
            "hangup" | "hang_up" | "hang-up" => Ok(NextAction::Hangup),
            "transfer" => Ok(NextAction::Transfer),
            _ => Err(format!("Unknown next action: {}", s)),
        }
    }
}
