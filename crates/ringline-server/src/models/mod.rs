//! Ringline API Data Models
//!
//! - Account: call owner and credit balance
//! - Call: call records, audit events, analytics
//! - Diagnostics: connectivity checks against remote services

mod account;
mod call;
mod diagnostics;

pub use account::*;
pub use call::*;
pub use diagnostics::*;
