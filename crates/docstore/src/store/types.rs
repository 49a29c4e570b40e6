//! Request and response shapes exchanged with the store.

use std::fmt;

use common::constants::MAX_PATCH_OPERATIONS;
use common::{AppError, AppResult};
use domain::ContainerMapping;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Partition key value.
///
/// Stored as JSON so string, numeric and boolean keys compare the way the
/// store compares them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(Value);

impl PartitionKey {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Whether `document` carries this key at the mapping's partition key path.
    pub fn matches(&self, document: &Value, mapping: &ContainerMapping) -> bool {
        mapping
            .partition_key_segments()
            .try_fold(document, |node, segment| node.get(segment))
            .is_some_and(|value| value == &self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(Value::from(value))
    }
}

impl From<&String> for PartitionKey {
    fn from(value: &String) -> Self {
        Self(Value::from(value.as_str()))
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// A named query parameter (`@param0`, `@userId`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Query text plus bound parameters, as sent to the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    pub parameters: Vec<QueryParameter>,
}

impl QuerySpec {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.push(QueryParameter::new(name, value));
        self
    }

    /// Look up a bound parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// Per-page query options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOptions {
    /// Restrict the query to one partition; `None` fans out across partitions
    pub partition_key: Option<PartitionKey>,
    /// Upper bound on items returned in this page
    pub max_item_count: Option<u32>,
    /// Continuation token from the previous page
    pub continuation: Option<String>,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPage {
    pub items: Vec<Value>,
    /// Present while more results remain
    pub continuation: Option<String>,
    pub request_charge: f64,
}

/// Point operation response.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponse {
    pub resource: Value,
    pub request_charge: f64,
}

/// Partial document update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Set { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
    #[serde(rename = "incr")]
    Increment { path: String, value: Value },
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        PatchOperation::Add {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        PatchOperation::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        PatchOperation::Replace {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        PatchOperation::Remove { path: path.into() }
    }

    pub fn increment(path: impl Into<String>, by: impl Into<Value>) -> Self {
        PatchOperation::Increment {
            path: path.into(),
            value: by.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Set { path, .. }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Increment { path, .. } => path,
        }
    }

    /// Check a patch request: 1 to 10 operations, every path absolute.
    pub fn validate_all(operations: &[PatchOperation]) -> AppResult<()> {
        if operations.is_empty() || operations.len() > MAX_PATCH_OPERATIONS {
            return Err(AppError::validation(format!(
                "patch requires 1 to {} operations, got {}",
                MAX_PATCH_OPERATIONS,
                operations.len()
            )));
        }

        if let Some(op) = operations.iter().find(|op| !op.path().starts_with('/')) {
            return Err(AppError::validation(format!(
                "patch path '{}' must start with '/'",
                op.path()
            )));
        }

        Ok(())
    }
}

/// Outcome of one operation inside a transactional batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperationResponse {
    pub status_code: u16,
    pub request_charge: f64,
    pub resource: Option<Value>,
    pub message: Option<String>,
}

impl BatchOperationResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Store response to a transactional batch.
///
/// When `success` is false nothing was applied; the failing operation carries
/// its own status and the others report failed dependency.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResponse {
    pub success: bool,
    pub results: Vec<BatchOperationResponse>,
}
