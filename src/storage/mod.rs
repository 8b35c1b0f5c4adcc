//! Storage layer.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`MemoryStore`] | Authoritative record store (collaborator contract) |
//! | [`CausalStorage`] | Causal edge store (collaborator contract) |
//! | [`L1Cache`] | Fixed-capacity LRU overlay |
//! | [`CachedMemoryStore`] | Read-through cache in front of any store |
//! | `InMemory*` | Reference backends for tests and embedding |

mod cache;
mod cached;
mod causal_memory;
mod memory;
pub mod traits;

pub use cache::{CacheStats, L1Cache};
pub use cached::CachedMemoryStore;
pub use causal_memory::InMemoryCausalStorage;
pub use memory::InMemoryMemoryStore;
pub use traits::{CausalStorage, EdgeQuery, MemoryQuery, MemoryStore, MemoryUpdate};
