//! Domain layer - Document types and their storage layout.
//!
//! This crate describes *what* is stored and *where*: the [`Document`] trait
//! every persisted type implements, the closed catalog mapping each document
//! type to its container and partition key path, and the declarative container
//! definitions used when provisioning a database.
//!
//! It has no knowledge of the store client, retries or query execution.

pub mod catalog;
pub mod constants;
pub mod containers;
pub mod document;
pub mod error;

pub use catalog::{container_for, mapped_types, ContainerMapping};
pub use constants::*;
pub use containers::{container_definitions, ContainerDefinition, IndexingPolicy};
pub use document::Document;
pub use error::{DomainError, DomainResult};
