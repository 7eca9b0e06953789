//! Storage engine contract and the in-memory backend.

mod memory;
mod traits;
pub(crate) mod tree;

pub use memory::MemoryStorage;
pub use traits::StorageEngine;
