//! Repository layer for typed document access.

mod container_store;

pub use container_store::{ContainerStore, QueryOutcome, Repository};

#[cfg(any(test, feature = "test-utils"))]
pub use container_store::MockRepository;
