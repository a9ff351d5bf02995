//! PostgreSQL Repository Implementations

mod account_repository;
mod call_repository;

pub use account_repository::PgAccountRepository;
pub use call_repository::PgCallRepository;
