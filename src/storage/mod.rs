//! Storage for the entity ledger.
//!
//! `traits` defines the contract collaborators depend on; `memory` is the
//! in-process backend with its secondary indexes in `index`.

mod index;
mod memory;
mod traits;

pub use memory::InMemoryEntityStore;
pub use traits::{EntityStore, StorageError};
