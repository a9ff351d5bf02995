//! Repository Ports
//!
//! Abstract interfaces for data persistence operations.

mod account_repository;
mod call_repository;

pub use account_repository::*;
pub use call_repository::*;
