//! Record stores: JSON documents on the local filesystem, and in-memory maps.

pub mod document;
pub mod json;
pub mod memory;

pub use document::{DocumentCollection, StorageError};
pub use json::{JsonApplicationRepository, JsonUserRepository};
pub use memory::{InMemoryApplicationRepository, InMemoryUserRepository};
