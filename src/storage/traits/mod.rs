//! Storage collaborator traits.

mod causal;
mod memory_store;

pub use causal::{CausalStorage, EdgeQuery};
pub use memory_store::{MemoryQuery, MemoryStore, MemoryUpdate};
