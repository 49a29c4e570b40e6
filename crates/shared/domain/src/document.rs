//! The contract every stored document type implements.

use serde::{de::DeserializeOwned, Serialize};

use crate::catalog::{container_for, ContainerMapping};
use crate::error::{DomainError, DomainResult};

/// A schemaless record stored under an id and a partition key.
///
/// `TYPE_NAME` is the logical type name looked up in the catalog; it is not
/// validated until a repository or batch first uses the type.
///
/// Documents serialize with camelCase field names, which is what the query
/// compiler assumes when it renders field references.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Logical document type name (catalog key)
    const TYPE_NAME: &'static str;

    /// Document id, unique within its partition
    fn id(&self) -> &str;

    /// Resolve the container mapping for this type.
    fn mapping() -> DomainResult<ContainerMapping> {
        container_for(Self::TYPE_NAME)
    }

    /// Check the document can be written: the store rejects empty ids.
    fn ensure_writable(&self) -> DomainResult<()> {
        if self.id().trim().is_empty() {
            return Err(DomainError::invalid_document(format!("{} has an empty id", Self::TYPE_NAME)));
        }
        Ok(())
    }
}
