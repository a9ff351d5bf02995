//! Call Lifecycle State Machine
//!
//! `initiated -> ringing -> in-progress -> {completed | failed | busy | no-answer | cancelled}`
//!
//! Each (state, trigger) pair resolves to exactly one outcome. Terminal
//! states reject every trigger, so a finished call can never reopen.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::value_objects::CallStatus;

/// Something that may move a call along its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "trigger", content = "status")]
pub enum CallTrigger {
    /// Gateway accepted the placement request
    GatewayAccepted,
    /// Gateway refused to place the call
    GatewayRejected,
    /// Destination picked up (connected callback, or speech arriving first)
    Answered,
    /// Agent decided the conversation is over
    ConversationEnded,
    /// Owner asked to hang up
    EndedByUser,
    /// Status callback from the gateway
    GatewayReported(CallStatus),
}

/// Outcome of a legal trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: CallStatus, to: CallStatus },
    /// Accepted but nothing changes (duplicate or backwards report)
    Unchanged(CallStatus),
}

impl Transition {
    pub fn changed(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }

    pub fn status(&self) -> CallStatus {
        match *self {
            Transition::Moved { to, .. } => to,
            Transition::Unchanged(status) => status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("call already ended with status {0}")]
    Terminal(CallStatus),

    #[error("trigger {trigger:?} is not valid while call is {from}")]
    Illegal {
        from: CallStatus,
        trigger: CallTrigger,
    },
}

impl From<TransitionError> for DomainError {
    fn from(e: TransitionError) -> Self {
        DomainError::Conflict(e.to_string())
    }
}

/// Resolve a trigger against the current status
pub fn transition(from: CallStatus, trigger: CallTrigger) -> Result<Transition, TransitionError> {
    use CallStatus::*;
    use CallTrigger::*;

    if from.is_terminal() {
        return Err(TransitionError::Terminal(from));
    }

    let moved = |to| Ok(Transition::Moved { from, to });

    match (from, trigger) {
        (Initiated, GatewayAccepted) => moved(Ringing),
        (Initiated, GatewayRejected) => moved(Failed),
        (Initiated | Ringing, Answered) => moved(InProgress),
        (InProgress, Answered) => Ok(Transition::Unchanged(InProgress)),
        (InProgress, ConversationEnded) => moved(Completed),
        (_, EndedByUser) => moved(Completed),
        (_, GatewayReported(reported)) if reported.rank() > from.rank() => moved(reported),
        (_, GatewayReported(_)) => Ok(Transition::Unchanged(from)),
        (from, trigger) => Err(TransitionError::Illegal { from, trigger }),
    }
}
