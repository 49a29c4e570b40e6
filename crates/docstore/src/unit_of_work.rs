//! Session-scoped repository cache and transactional batches.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use common::{AppError, AppResult};
use domain::Document;
use parking_lot::Mutex;

use crate::batch::{self, BatchOperation, BatchResult, BatchState};
use crate::connection::ConnectionManager;
use crate::context::RequestContext;
use crate::repository::ContainerStore;
use crate::retry::RetryPolicy;
use crate::store::PartitionKey;

type CachedRepository = Arc<dyn Any + Send + Sync>;

/// A unit of work over one connection.
///
/// Hands out one repository per document type for its lifetime and runs
/// atomic batches. Safe to share between tasks.
pub struct UnitOfWork {
    connection: Arc<ConnectionManager>,
    repositories: Mutex<HashMap<TypeId, CachedRepository>>,
    batch_retry: RetryPolicy,
}

impl UnitOfWork {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        let config = connection.config();
        let batch_retry = RetryPolicy::for_batches(config.retry_attempts, config.request_timeout());
        Self::with_batch_retry(connection, batch_retry)
    }

    pub fn with_batch_retry(connection: Arc<ConnectionManager>, batch_retry: RetryPolicy) -> Self {
        Self {
            connection,
            repositories: Mutex::new(HashMap::new()),
            batch_retry,
        }
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Repository for `T`, created on first request and cached afterwards.
    pub fn repository<T: Document>(&self) -> AppResult<Arc<ContainerStore<T>>> {
        let mut repositories = self.repositories.lock();

        if let Some(cached) = repositories.get(&TypeId::of::<T>()) {
            return Arc::clone(cached)
                .downcast::<ContainerStore<T>>()
                .map_err(|_| AppError::internal(format!("repository cache holds the wrong type for {}", T::TYPE_NAME)));
        }

        let repository = Arc::new(ContainerStore::<T>::new(&self.connection)?);
        repositories.insert(TypeId::of::<T>(), repository.clone() as CachedRepository);

        tracing::debug!(
            document_type = T::TYPE_NAME,
            container = repository.container_name(),
            "Repository created"
        );
        Ok(repository)
    }

    /// Execute `operations` atomically within one partition.
    ///
    /// All operations must target the same container and `partition_key`;
    /// anything else is rejected before a request is sent. The store either
    /// applies every operation or none of them.
    pub async fn execute_batch(
        &self,
        ctx: &RequestContext,
        operations: Vec<BatchOperation>,
        partition_key: PartitionKey,
    ) -> AppResult<BatchResult> {
        let mut state = BatchState::Built;

        let mapping = batch::validate(&operations, &partition_key)?;
        let container = self.connection.container(mapping.container)?;
        let client = container.client();

        state = transition(state, BatchState::Submitted, container.name());
        let response = self
            .batch_retry
            .execute("batch", ctx, || client.execute_batch(&partition_key, operations.clone()))
            .await?;

        let result = BatchResult::from_response(response);
        transition(state, result.state, container.name());

        if let Some(failure) = &result.first_failure {
            tracing::warn!(
                container = container.name(),
                partition_key = %partition_key,
                operations = operations.len(),
                failed_index = failure.index,
                failed_operation = operations.get(failure.index).map(BatchOperation::kind),
                status = failure.status_code,
                message = failure.message.as_deref(),
                "Batch aborted"
            );
        }

        Ok(result)
    }
}

fn transition(from: BatchState, to: BatchState, container: &str) -> BatchState {
    tracing::debug!(container, from = %from, to = %to, "Batch state changed");
    to
}
