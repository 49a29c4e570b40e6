//! Typed client layer over a partitioned document store.
//!
//! - [`ConnectionManager`] owns the store client and caches container handles
//! - [`ContainerStore`] implements [`Repository`] for one document type, with
//!   every store call running under a [`RetryPolicy`]
//! - [`QueryCompiler`] turns [`DocumentQuery`] plans into parameterized query text
//! - [`UnitOfWork`] caches repositories and runs single-partition atomic batches
//!
//! The wire protocol lives behind the [`StoreClient`] / [`ContainerClient`] seam.

pub mod batch;
pub mod connection;
pub mod context;
pub mod provisioning;
pub mod query;
pub mod repository;
pub mod retry;
pub mod store;
pub mod unit_of_work;

pub use batch::{BatchOperation, BatchResult, BatchState, DocumentRef, OperationResult};
pub use connection::{ConnectionManager, ConnectionStatsSnapshot, ContainerHandle, HealthCheck};
pub use context::RequestContext;
pub use provisioning::Provisioner;
pub use query::{field, DocumentQuery, Filter, QueryCompiler};
pub use repository::{ContainerStore, QueryOutcome, Repository};
pub use retry::RetryPolicy;
pub use store::{ContainerClient, PartitionKey, PatchOperation, QuerySpec, StoreClient};
pub use unit_of_work::UnitOfWork;

use std::sync::Arc;

use common::{AppResult, ConnectionConfig};

/// Connect with configuration read from `DOCSTORE_*` environment variables
/// (and a `.env` file when present).
pub fn connect_from_env(client: Arc<dyn StoreClient>) -> AppResult<Arc<ConnectionManager>> {
    let config = ConnectionConfig::from_env()?;
    ConnectionManager::connect(client, config)
}
