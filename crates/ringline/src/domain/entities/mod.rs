//! Domain Entities
//!
//! Pure domain models without infrastructure dependencies.
//! - Call: outbound conversation session and its billing record
//! - CallEvent: append-only audit trail
//! - Account: call owner and credit balance

mod account;
mod call;
mod call_event;

pub use account::*;
pub use call::*;
pub use call_event::*;
