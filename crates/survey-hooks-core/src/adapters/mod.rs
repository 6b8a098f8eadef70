//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the persistence, survey directory,
//! membership and session ports.

pub mod filesystem_store;
pub mod memory;

pub use filesystem_store::FilesystemWebhookStore;
pub use memory::{InMemoryMembershipStore, InMemoryWebhookStore, StaticSessionProvider};
