//! Server-side services that are not ports of the domain

pub mod callback_signer;

pub use callback_signer::CallbackSigner;
