//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod call_status;
mod next_action;
mod phone_number;

pub use call_status::*;
pub use next_action::*;
pub use phone_number::*;
