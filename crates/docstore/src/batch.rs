//! Transactional batch operations.
//!
//! A batch is a list of [`BatchOperation`]s that the store applies atomically
//! within one container and one partition key. [`validate`] enforces both
//! before anything is sent; [`BatchResult`] reports the outcome.

use std::fmt;

use common::constants::{MAX_BATCH_OPERATIONS, STATUS_FAILED_DEPENDENCY};
use common::{AppError, AppResult};
use domain::{container_for, ContainerMapping, Document};
use serde_json::Value;

use crate::store::{BatchResponse, PartitionKey, PatchOperation};

/// Document addressed by a batch operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRef {
    pub document_type: &'static str,
    pub id: String,
    pub partition_key: PartitionKey,
}

impl DocumentRef {
    fn of<T: Document>(id: impl Into<String>, partition_key: PartitionKey) -> Self {
        Self {
            document_type: T::TYPE_NAME,
            id: id.into(),
            partition_key,
        }
    }
}

/// One operation inside a transactional batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    /// Insert; fails with a conflict if the id exists
    Create { target: DocumentRef, document: Value },
    /// Overwrite an existing document
    Replace { target: DocumentRef, document: Value },
    Delete { target: DocumentRef },
    Patch {
        target: DocumentRef,
        operations: Vec<PatchOperation>,
    },
}

impl BatchOperation {
    pub fn create<T: Document>(document: &T, partition_key: impl Into<PartitionKey>) -> AppResult<Self> {
        let (target, document) = Self::serialize(document, partition_key.into())?;
        Ok(BatchOperation::Create { target, document })
    }

    pub fn replace<T: Document>(document: &T, partition_key: impl Into<PartitionKey>) -> AppResult<Self> {
        let (target, document) = Self::serialize(document, partition_key.into())?;
        Ok(BatchOperation::Replace { target, document })
    }

    pub fn delete<T: Document>(id: impl Into<String>, partition_key: impl Into<PartitionKey>) -> Self {
        BatchOperation::Delete {
            target: DocumentRef::of::<T>(id, partition_key.into()),
        }
    }

    pub fn patch<T: Document>(
        id: impl Into<String>,
        partition_key: impl Into<PartitionKey>,
        operations: Vec<PatchOperation>,
    ) -> AppResult<Self> {
        PatchOperation::validate_all(&operations)?;
        Ok(BatchOperation::Patch {
            target: DocumentRef::of::<T>(id, partition_key.into()),
            operations,
        })
    }

    fn serialize<T: Document>(document: &T, partition_key: PartitionKey) -> AppResult<(DocumentRef, Value)> {
        document.ensure_writable()?;
        let value = serde_json::to_value(document)?;
        Ok((DocumentRef::of::<T>(document.id(), partition_key), value))
    }

    pub fn target(&self) -> &DocumentRef {
        match self {
            BatchOperation::Create { target, .. }
            | BatchOperation::Replace { target, .. }
            | BatchOperation::Delete { target }
            | BatchOperation::Patch { target, .. } => target,
        }
    }

    /// Short operation name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchOperation::Create { .. } => "create",
            BatchOperation::Replace { .. } => "replace",
            BatchOperation::Delete { .. } => "delete",
            BatchOperation::Patch { .. } => "patch",
        }
    }

    /// Document body for create and replace.
    pub fn document(&self) -> Option<&Value> {
        match self {
            BatchOperation::Create { document, .. } | BatchOperation::Replace { document, .. } => {
                Some(document)
            }
            _ => None,
        }
    }
}

/// Check a batch and resolve the single container it targets.
///
/// Rejects empty or oversized batches, operations whose document type maps to
/// a different container than the first one, and operations whose partition
/// key differs from `partition_key`. Create and replace bodies must also
/// carry `partition_key` at the container's partition key path.
pub fn validate(operations: &[BatchOperation], partition_key: &PartitionKey) -> AppResult<ContainerMapping> {
    let Some(first) = operations.first() else {
        return Err(AppError::invalid_batch("batch contains no operations"));
    };
    if operations.len() > MAX_BATCH_OPERATIONS {
        return Err(AppError::invalid_batch(format!(
            "batch contains {} operations, the limit is {}",
            operations.len(),
            MAX_BATCH_OPERATIONS
        )));
    }

    let mapping = container_for(first.target().document_type)?;

    for (index, operation) in operations.iter().enumerate() {
        let target = operation.target();

        let target_mapping = container_for(target.document_type)?;
        if target_mapping.container != mapping.container {
            return Err(AppError::invalid_batch(format!(
                "operation {} targets container '{}' but the batch targets '{}'",
                index, target_mapping.container, mapping.container
            )));
        }

        if &target.partition_key != partition_key {
            return Err(AppError::invalid_batch(format!(
                "operation {} uses partition key '{}' but the batch uses '{}'",
                index, target.partition_key, partition_key
            )));
        }

        if let Some(document) = operation.document() {
            if !partition_key.matches(document, &mapping) {
                return Err(AppError::invalid_batch(format!(
                    "operation {} document '{}' does not carry partition key '{}' at {}",
                    index, target.id, partition_key, mapping.partition_key_path
                )));
            }
        }
    }

    Ok(mapping)
}

/// Batch lifecycle. Callers only ever see the final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Built,
    Submitted,
    Committed,
    Aborted,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Built => "built",
            BatchState::Submitted => "submitted",
            BatchState::Committed => "committed",
            BatchState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of one operation in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub index: usize,
    pub status_code: u16,
    pub request_charge: f64,
    pub message: Option<String>,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Outcome of a transactional batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// True only when every operation was applied
    pub committed: bool,
    pub state: BatchState,
    pub operations: Vec<OperationResult>,
    /// The operation that caused the abort, if any
    pub first_failure: Option<OperationResult>,
    pub request_charge: f64,
}

impl BatchResult {
    pub(crate) fn from_response(response: BatchResponse) -> Self {
        let operations: Vec<OperationResult> = response
            .results
            .into_iter()
            .enumerate()
            .map(|(index, result)| OperationResult {
                index,
                status_code: result.status_code,
                request_charge: result.request_charge,
                message: result.message,
            })
            .collect();

        let committed = response.success && operations.iter().all(OperationResult::is_success);

        // Operations rolled back because of another one report 424
        let first_failure = if committed {
            None
        } else {
            operations
                .iter()
                .find(|op| !op.is_success() && op.status_code != STATUS_FAILED_DEPENDENCY)
                .or_else(|| operations.iter().find(|op| !op.is_success()))
                .cloned()
        };

        let request_charge = operations.iter().map(|op| op.request_charge).sum();

        Self {
            committed,
            state: if committed {
                BatchState::Committed
            } else {
                BatchState::Aborted
            },
            operations,
            first_failure,
            request_charge,
        }
    }
}
