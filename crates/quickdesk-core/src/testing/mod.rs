//! Test utilities: in-memory services, a wired [`TestDesk`] and assertion
//! macros.
//!
//! Enable the `testing` feature to use these from another crate's tests.

pub mod assertions;
mod context;
mod memory_store;
mod mock_services;

pub use context::TestDesk;
pub use memory_store::MemoryStore;
pub use mock_services::{MemoryObjectStore, MockMailer, StoredObject};
