//! Service Ports
//!
//! Interfaces to the remote capabilities a call depends on.

mod llm_provider;
mod telephony;

pub use llm_provider::*;
pub use telephony::*;
