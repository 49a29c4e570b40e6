//! Store seam - the boundary between this client layer and the wire protocol.
//!
//! [`StoreClient`] is the account/database level handle and [`ContainerClient`]
//! the container level one. A concrete adapter speaks the store's protocol and
//! classifies failures with [`common::AppError::from_status`]; everything
//! above this module only sees these traits.

mod types;

use std::sync::Arc;

use async_trait::async_trait;
use common::AppResult;
use domain::ContainerDefinition;

use crate::batch::BatchOperation;

pub use types::{
    BatchOperationResponse, BatchResponse, ItemResponse, PartitionKey, PatchOperation,
    QueryOptions, QueryPage, QueryParameter, QuerySpec,
};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Account-level store client.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Lightweight existence read of a database
    async fn read_database(&self, database: &str) -> AppResult<()>;

    /// Build a client for one container. Construction does no I/O.
    fn container(&self, database: &str, container: &str) -> Arc<dyn ContainerClient>;

    /// Create the database if missing; returns true when it was created
    async fn create_database_if_not_exists(
        &self,
        database: &str,
        autoscale_max_throughput: Option<u32>,
    ) -> AppResult<bool>;

    /// Create a container if missing; returns true when it was created
    async fn create_container_if_not_exists(
        &self,
        database: &str,
        definition: &ContainerDefinition,
    ) -> AppResult<bool>;

    /// Release sockets and background work held by the client
    fn dispose(&self);
}

/// Container-level store client.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ContainerClient: Send + Sync {
    /// Point read; a missing document is `AppError::NotFound`
    async fn read_item(&self, id: &str, partition_key: &PartitionKey) -> AppResult<ItemResponse>;

    /// Create or replace by id
    async fn upsert_item(
        &self,
        partition_key: &PartitionKey,
        item: serde_json::Value,
    ) -> AppResult<ItemResponse>;

    /// Delete by id; returns the request charge
    async fn delete_item(&self, id: &str, partition_key: &PartitionKey) -> AppResult<f64>;

    /// Apply partial updates to an existing document
    async fn patch_item(
        &self,
        id: &str,
        partition_key: &PartitionKey,
        operations: Vec<PatchOperation>,
    ) -> AppResult<ItemResponse>;

    /// Fetch one page of query results
    async fn query_items(&self, query: &QuerySpec, options: &QueryOptions) -> AppResult<QueryPage>;

    /// Execute operations atomically within one partition
    async fn execute_batch(
        &self,
        partition_key: &PartitionKey,
        operations: Vec<BatchOperation>,
    ) -> AppResult<BatchResponse>;
}
