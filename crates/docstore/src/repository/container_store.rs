//! Generic document repository over one container.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use common::constants::MAX_DOCUMENT_SIZE_BYTES;
use common::{AppError, AppResult};
use domain::{ContainerMapping, Document};
use serde_json::Value;

use crate::connection::{ConnectionManager, ContainerHandle};
use crate::context::RequestContext;
use crate::query::{DocumentQuery, Filter, QueryCompiler};
use crate::retry::RetryPolicy;
use crate::store::{PartitionKey, PatchOperation, QueryOptions, QuerySpec};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Query results together with what they cost.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome<T> {
    pub items: Vec<T>,
    /// Total request units consumed across all pages
    pub request_charge: f64,
    pub pages: u32,
}

/// Typed repository for one document type.
///
/// Every call takes a [`RequestContext`] and every store round trip runs
/// under the retry policy. A missing document is `None`/`false` for reads and
/// deletes, and `NotFound` for patches.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Repository<T: Document>: Send + Sync {
    /// Create or replace by id; returns the stored document
    async fn upsert(&self, ctx: &RequestContext, document: T, partition_key: PartitionKey) -> AppResult<T>;

    /// Point read
    async fn get(&self, ctx: &RequestContext, id: &str, partition_key: &PartitionKey) -> AppResult<Option<T>>;

    async fn exists(&self, ctx: &RequestContext, id: &str, partition_key: &PartitionKey) -> AppResult<bool>;

    /// Delete by id; false when nothing matched
    async fn delete(&self, ctx: &RequestContext, id: &str, partition_key: &PartitionKey) -> AppResult<bool>;

    /// Filter documents, optionally scoped to one partition
    async fn query_by_predicate(
        &self,
        ctx: &RequestContext,
        filter: Filter,
        partition_key: Option<PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<Vec<T>>;

    /// Run a full query plan (filter, ordering, skip, take)
    async fn query(&self, ctx: &RequestContext, query: DocumentQuery, max_results: Option<usize>) -> AppResult<Vec<T>>;

    /// Same as `query`, also reporting request charge and page count
    async fn query_with_metrics(
        &self,
        ctx: &RequestContext,
        query: DocumentQuery,
        max_results: Option<usize>,
    ) -> AppResult<QueryOutcome<T>>;

    /// Run a pre-built query; parameter names must start with '@'
    async fn query_raw(
        &self,
        ctx: &RequestContext,
        query: QuerySpec,
        partition_key: Option<PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<Vec<T>>;

    /// Same as `query_raw`, also reporting request charge and page count
    async fn query_raw_with_metrics(
        &self,
        ctx: &RequestContext,
        query: QuerySpec,
        partition_key: Option<PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<QueryOutcome<T>>;

    /// Count matching documents
    async fn count(&self, ctx: &RequestContext, filter: Option<Filter>, partition_key: Option<PartitionKey>) -> AppResult<u64>;

    /// Apply 1 to 10 patch operations to an existing document
    async fn patch(
        &self,
        ctx: &RequestContext,
        id: &str,
        partition_key: &PartitionKey,
        operations: Vec<PatchOperation>,
    ) -> AppResult<T>;
}

/// Store-backed implementation of [`Repository`].
pub struct ContainerStore<T> {
    container: Arc<ContainerHandle>,
    mapping: ContainerMapping,
    retry: RetryPolicy,
    compiler: QueryCompiler,
    _document: PhantomData<fn() -> T>,
}

impl<T: Document> ContainerStore<T> {
    /// Bind a repository to the container of `T`.
    ///
    /// Fails immediately with a configuration error if `T` is not mapped.
    pub fn new(connection: &ConnectionManager) -> AppResult<Self> {
        Self::with_retry_policy(connection, RetryPolicy::from_config(connection.config()))
    }

    pub fn with_retry_policy(connection: &ConnectionManager, retry: RetryPolicy) -> AppResult<Self> {
        let mapping = T::mapping()?;
        let container = connection.container(mapping.container)?;

        Ok(Self {
            container,
            mapping,
            retry,
            compiler: QueryCompiler::new(connection.config().default_page_size),
            _document: PhantomData,
        })
    }

    pub fn container_name(&self) -> &str {
        self.container.name()
    }

    pub fn mapping(&self) -> ContainerMapping {
        self.mapping
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn encode(&self, document: &T, partition_key: &PartitionKey) -> AppResult<Value> {
        document.ensure_writable()?;
        let value = serde_json::to_value(document)?;

        if !partition_key.matches(&value, &self.mapping) {
            return Err(AppError::validation(format!(
                "{} '{}' does not carry partition key '{}' at {}",
                T::TYPE_NAME,
                document.id(),
                partition_key,
                self.mapping.partition_key_path
            )));
        }

        let size = serde_json::to_vec(&value)?.len();
        if size > MAX_DOCUMENT_SIZE_BYTES {
            return Err(AppError::PayloadTooLarge(format!(
                "{} '{}' is {} bytes, the limit is {}",
                T::TYPE_NAME,
                document.id(),
                size,
                MAX_DOCUMENT_SIZE_BYTES
            )));
        }

        Ok(value)
    }

    fn decode(value: Value) -> AppResult<T> {
        Ok(serde_json::from_value(value)?)
    }

    fn plan(&self, query: &DocumentQuery) -> AppResult<QuerySpec> {
        if query.requires_compiled_paging() {
            self.compiler.compile(query)
        } else {
            self.compiler.compile_filter(query.filter_ref())
        }
    }

    /// Page through a query until the store runs out or `max_results` is reached.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        spec: &QuerySpec,
        partition_key: Option<&PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<QueryOutcome<Value>> {
        let client = self.container.client();
        let page_size = self.compiler.default_page_size();
        let mut outcome = QueryOutcome {
            items: Vec::new(),
            request_charge: 0.0,
            pages: 0,
        };
        let mut continuation = None;

        loop {
            let remaining = max_results.map(|max| max.saturating_sub(outcome.items.len()));
            if remaining == Some(0) {
                break;
            }

            let options = QueryOptions {
                partition_key: partition_key.cloned(),
                max_item_count: Some(match remaining {
                    Some(remaining) => page_size.min(u32::try_from(remaining).unwrap_or(u32::MAX)),
                    None => page_size,
                }),
                continuation: continuation.take(),
            };

            let page = self
                .retry
                .execute("query", ctx, || client.query_items(spec, &options))
                .await?;

            outcome.pages += 1;
            outcome.request_charge += page.request_charge;
            outcome.items.extend(page.items);

            tracing::debug!(
                container = self.container.name(),
                page = outcome.pages,
                items = outcome.items.len(),
                request_charge = page.request_charge,
                "Query page fetched"
            );

            match page.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        if let Some(max) = max_results {
            outcome.items.truncate(max);
        }

        tracing::debug!(
            container = self.container.name(),
            items = outcome.items.len(),
            pages = outcome.pages,
            request_charge = outcome.request_charge,
            "Query completed"
        );
        Ok(outcome)
    }

    async fn fetch_typed(
        &self,
        ctx: &RequestContext,
        spec: &QuerySpec,
        partition_key: Option<&PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<QueryOutcome<T>> {
        let outcome = self.fetch(ctx, spec, partition_key, max_results).await?;
        let items = outcome
            .items
            .into_iter()
            .map(Self::decode)
            .collect::<AppResult<Vec<T>>>()?;

        Ok(QueryOutcome {
            items,
            request_charge: outcome.request_charge,
            pages: outcome.pages,
        })
    }
}

#[async_trait]
impl<T: Document> Repository<T> for ContainerStore<T> {
    async fn upsert(&self, ctx: &RequestContext, document: T, partition_key: PartitionKey) -> AppResult<T> {
        let value = self.encode(&document, &partition_key)?;
        let client = self.container.client();

        let response = self
            .retry
            .execute("upsert", ctx, || client.upsert_item(&partition_key, value.clone()))
            .await?;

        tracing::debug!(
            container = self.container.name(),
            id = document.id(),
            request_charge = response.request_charge,
            "Document upserted"
        );
        Self::decode(response.resource)
    }

    async fn get(&self, ctx: &RequestContext, id: &str, partition_key: &PartitionKey) -> AppResult<Option<T>> {
        let client = self.container.client();

        match self
            .retry
            .execute("read", ctx, || client.read_item(id, partition_key))
            .await
        {
            Ok(response) => Self::decode(response.resource).map(Some),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn exists(&self, ctx: &RequestContext, id: &str, partition_key: &PartitionKey) -> AppResult<bool> {
        Ok(self.get(ctx, id, partition_key).await?.is_some())
    }

    async fn delete(&self, ctx: &RequestContext, id: &str, partition_key: &PartitionKey) -> AppResult<bool> {
        let client = self.container.client();

        match self
            .retry
            .execute("delete", ctx, || client.delete_item(id, partition_key))
            .await
        {
            Ok(request_charge) => {
                tracing::debug!(container = self.container.name(), id, request_charge, "Document deleted");
                Ok(true)
            }
            Err(AppError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn query_by_predicate(
        &self,
        ctx: &RequestContext,
        filter: Filter,
        partition_key: Option<PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<Vec<T>> {
        let query = DocumentQuery::new().filter(filter).with_partition_key(partition_key);
        self.query(ctx, query, max_results).await
    }

    async fn query(&self, ctx: &RequestContext, query: DocumentQuery, max_results: Option<usize>) -> AppResult<Vec<T>> {
        Ok(self.query_with_metrics(ctx, query, max_results).await?.items)
    }

    async fn query_with_metrics(
        &self,
        ctx: &RequestContext,
        query: DocumentQuery,
        max_results: Option<usize>,
    ) -> AppResult<QueryOutcome<T>> {
        let spec = self.plan(&query)?;
        let limit = match (max_results, query.take_count()) {
            (Some(max), Some(take)) => Some(max.min(take as usize)),
            (max, take) => max.or(take.map(|take| take as usize)),
        };
        self.fetch_typed(ctx, &spec, query.partition(), limit).await
    }

    async fn query_raw(
        &self,
        ctx: &RequestContext,
        query: QuerySpec,
        partition_key: Option<PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<Vec<T>> {
        Ok(self
            .query_raw_with_metrics(ctx, query, partition_key, max_results)
            .await?
            .items)
    }

    async fn query_raw_with_metrics(
        &self,
        ctx: &RequestContext,
        query: QuerySpec,
        partition_key: Option<PartitionKey>,
        max_results: Option<usize>,
    ) -> AppResult<QueryOutcome<T>> {
        if let Some(param) = query.parameters.iter().find(|p| !p.name.starts_with('@')) {
            return Err(AppError::validation(format!(
                "query parameter '{}' must start with '@'",
                param.name
            )));
        }

        self.fetch_typed(ctx, &query, partition_key.as_ref(), max_results)
            .await
    }

    async fn count(&self, ctx: &RequestContext, filter: Option<Filter>, partition_key: Option<PartitionKey>) -> AppResult<u64> {
        let spec = self.compiler.compile_count(filter.as_ref())?;
        let outcome = self.fetch(ctx, &spec, partition_key.as_ref(), None).await?;

        // Cross-partition counts may come back as one partial count per page
        outcome
            .items
            .iter()
            .map(|value| {
                value
                    .as_u64()
                    .ok_or_else(|| AppError::internal(format!("count query returned {}", value)))
            })
            .sum()
    }

    async fn patch(
        &self,
        ctx: &RequestContext,
        id: &str,
        partition_key: &PartitionKey,
        operations: Vec<PatchOperation>,
    ) -> AppResult<T> {
        PatchOperation::validate_all(&operations)?;
        let client = self.container.client();

        let response = self
            .retry
            .execute("patch", ctx, || client.patch_item(id, partition_key, operations.clone()))
            .await?;

        tracing::debug!(
            container = self.container.name(),
            id,
            operations = operations.len(),
            request_charge = response.request_charge,
            "Document patched"
        );
        Self::decode(response.resource)
    }
}
