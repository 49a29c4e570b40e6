//! Domain-level errors.
//!
//! These errors describe problems with the document catalog itself.
//! They are independent of the store client and its failure classes.

use thiserror::Error;

/// Domain-specific errors for catalog and document shape violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A document type has no container mapping
    #[error("Document type '{0}' has no container mapping")]
    UnmappedDocumentType(String),

    /// A partition key path is malformed
    #[error("Invalid partition key path '{0}'")]
    InvalidPartitionKeyPath(String),

    /// A document does not satisfy its own contract
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl DomainError {
    /// Create an unmapped document type error
    pub fn unmapped(type_name: impl Into<String>) -> Self {
        DomainError::UnmappedDocumentType(type_name.into())
    }

    /// Create an invalid document error
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        DomainError::InvalidDocument(msg.into())
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
