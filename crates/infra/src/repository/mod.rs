//! Storage seam for products, documents and stock moves.
//!
//! - `Repository`: storage trait used by the stock service
//! - `InMemoryRepository`: single-process implementation (tests/dev)

mod in_memory;
mod r#trait;

pub use in_memory::InMemoryRepository;
pub use r#trait::{Commit, Repository, RepositoryError, Versioned};
