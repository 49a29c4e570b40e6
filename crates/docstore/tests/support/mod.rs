//! In-memory store double shared by the integration tests.
//!
//! Understands the query shapes this crate generates: `SELECT * FROM c` with
//! an optional conjunction of equality filters, a single `ORDER BY` key,
//! `OFFSET`/`LIMIT`, and `SELECT VALUE COUNT(1)`. Batches are applied to a
//! copy of the container and committed only when every operation succeeds.

#![allow(dead_code)]

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::constants::STATUS_FAILED_DEPENDENCY;
use common::{AppError, AppResult, ConnectionConfig};
use docstore::store::{
    BatchOperationResponse, BatchResponse, ItemResponse, QueryOptions, QueryPage,
};
use docstore::{BatchOperation, ConnectionManager, ContainerClient, PartitionKey, PatchOperation, QuerySpec, StoreClient};
use domain::{ContainerDefinition, Document, TYPE_GOAL, TYPE_TASK, TYPE_USER};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DATABASE: &str = "testdb";

pub fn init_tracing() {
    common::telemetry::init_tracing("docstore=debug");
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig::new("https://localhost:8081/", "test-key", DATABASE)
}

pub fn connect(store: &FakeStore) -> Arc<ConnectionManager> {
    init_tracing();
    Arc::new(ConnectionManager::new(Arc::new(store.clone()), config()).expect("valid config"))
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub priority: i64,
    #[serde(default)]
    pub completed: bool,
}

impl Document for Goal {
    const TYPE_NAME: &'static str = TYPE_GOAL;
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn goal(id: &str, user_id: &str, title: &str, priority: i64) -> Goal {
    Goal {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        priority,
        completed: false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub description: String,
}

impl Document for Task {
    const TYPE_NAME: &'static str = TYPE_TASK;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
}

impl Document for UserProfile {
    const TYPE_NAME: &'static str = TYPE_USER;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
}

impl Document for Invoice {
    const TYPE_NAME: &'static str = "Invoice";
    fn id(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    containers: Mutex<HashMap<String, Arc<FakeContainer>>>,
    container_calls: AtomicUsize,
    created_containers: Mutex<Vec<String>>,
    database_created: AtomicBool,
    disposed: AtomicBool,
    health_failures: Mutex<VecDeque<AppError>>,
}

/// Cloneable handle to one in-memory account.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<StoreState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a container, created empty if never touched.
    pub fn container_state(&self, name: &str) -> Arc<FakeContainer> {
        self.state
            .containers
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(FakeContainer::new(name)))
            .clone()
    }

    /// Number of times a container client was built.
    pub fn container_calls(&self) -> usize {
        self.state.container_calls.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::SeqCst)
    }

    pub fn fail_health_check(&self, err: AppError) {
        self.state.health_failures.lock().push_back(err);
    }
}

#[async_trait]
impl StoreClient for FakeStore {
    async fn read_database(&self, _database: &str) -> AppResult<()> {
        match self.state.health_failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn container(&self, _database: &str, container: &str) -> Arc<dyn ContainerClient> {
        self.state.container_calls.fetch_add(1, Ordering::SeqCst);
        self.container_state(container)
    }

    async fn create_database_if_not_exists(
        &self,
        _database: &str,
        _autoscale_max_throughput: Option<u32>,
    ) -> AppResult<bool> {
        Ok(!self.state.database_created.swap(true, Ordering::SeqCst))
    }

    async fn create_container_if_not_exists(
        &self,
        _database: &str,
        definition: &ContainerDefinition,
    ) -> AppResult<bool> {
        let mut created = self.state.created_containers.lock();
        if created.contains(&definition.name) {
            return Ok(false);
        }
        created.push(definition.name.clone());
        Ok(true)
    }

    fn dispose(&self) {
        self.state.disposed.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

type DocumentKey = (String, String);

/// One in-memory container with call counters and failure injection.
pub struct FakeContainer {
    name: String,
    documents: Mutex<BTreeMap<DocumentKey, Value>>,
    failures: Mutex<VecDeque<AppError>>,
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
    queries: Mutex<Vec<QuerySpec>>,
}

impl FakeContainer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documents: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next calls, in order, with these errors.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = AppError>) {
        self.failures.lock().extend(errors);
    }

    /// Total calls of any kind, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn document(&self, id: &str, partition_key: &str) -> Option<Value> {
        self.documents
            .lock()
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn queries(&self) -> Vec<QuerySpec> {
        self.queries.lock().clone()
    }

    fn begin(&self) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn key(id: &str, partition_key: &PartitionKey) -> DocumentKey {
        (partition_key.to_string(), id.to_string())
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::not_found(format!("{} '{}'", self.name, id))
    }
}

#[async_trait]
impl ContainerClient for FakeContainer {
    async fn read_item(&self, id: &str, partition_key: &PartitionKey) -> AppResult<ItemResponse> {
        self.begin()?;
        self.documents
            .lock()
            .get(&Self::key(id, partition_key))
            .cloned()
            .map(|resource| ItemResponse {
                resource,
                request_charge: 1.0,
            })
            .ok_or_else(|| self.not_found(id))
    }

    async fn upsert_item(&self, partition_key: &PartitionKey, item: Value) -> AppResult<ItemResponse> {
        self.begin()?;
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::validation("document has no id"))?
            .to_string();

        self.documents
            .lock()
            .insert(Self::key(&id, partition_key), item.clone());
        Ok(ItemResponse {
            resource: item,
            request_charge: 10.0,
        })
    }

    async fn delete_item(&self, id: &str, partition_key: &PartitionKey) -> AppResult<f64> {
        self.begin()?;
        self.documents
            .lock()
            .remove(&Self::key(id, partition_key))
            .map(|_| 5.0)
            .ok_or_else(|| self.not_found(id))
    }

    async fn patch_item(
        &self,
        id: &str,
        partition_key: &PartitionKey,
        operations: Vec<PatchOperation>,
    ) -> AppResult<ItemResponse> {
        self.begin()?;
        let mut documents = self.documents.lock();
        let document = documents
            .get_mut(&Self::key(id, partition_key))
            .ok_or_else(|| self.not_found(id))?;

        apply_patch(document, &operations)?;
        Ok(ItemResponse {
            resource: document.clone(),
            request_charge: 10.0,
        })
    }

    async fn query_items(&self, query: &QuerySpec, options: &QueryOptions) -> AppResult<QueryPage> {
        self.begin()?;
        self.queries.lock().push(query.clone());

        let scoped: Vec<Value> = self
            .documents
            .lock()
            .iter()
            .filter(|((pk, _), _)| match &options.partition_key {
                Some(key) => pk == &key.to_string(),
                None => true,
            })
            .map(|(_, doc)| doc.clone())
            .collect();

        let results = evaluate(query, scoped)?;

        let start: usize = options
            .continuation
            .as_deref()
            .map(|token| token.parse().map_err(|_| AppError::validation("bad continuation")))
            .transpose()?
            .unwrap_or(0);
        let page_size = options.max_item_count.unwrap_or(u32::MAX) as usize;
        let end = start.saturating_add(page_size).min(results.len());

        Ok(QueryPage {
            items: results[start.min(end)..end].to_vec(),
            continuation: (end < results.len()).then(|| end.to_string()),
            request_charge: 2.0,
        })
    }

    async fn execute_batch(
        &self,
        partition_key: &PartitionKey,
        operations: Vec<BatchOperation>,
    ) -> AppResult<BatchResponse> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.begin()?;

        let mut documents = self.documents.lock();
        let mut staged = documents.clone();
        let mut results = Vec::with_capacity(operations.len());
        let mut failed = false;

        for operation in &operations {
            if failed {
                results.push(status(STATUS_FAILED_DEPENDENCY, Some("dependent operation failed")));
                continue;
            }

            let key = Self::key(&operation.target().id, partition_key);
            let outcome = match operation {
                BatchOperation::Create { document, .. } => {
                    if staged.contains_key(&key) {
                        Err(409)
                    } else {
                        staged.insert(key, document.clone());
                        Ok(201)
                    }
                }
                BatchOperation::Replace { document, .. } => match staged.get_mut(&key) {
                    Some(existing) => {
                        *existing = document.clone();
                        Ok(200)
                    }
                    None => Err(404),
                },
                BatchOperation::Delete { .. } => staged.remove(&key).map(|_| 204).ok_or(404),
                BatchOperation::Patch { operations, .. } => match staged.get_mut(&key) {
                    Some(existing) => apply_patch(existing, operations).map(|_| 200).map_err(|_| 400),
                    None => Err(404),
                },
            };

            match outcome {
                Ok(code) => results.push(status(code, None)),
                Err(code) => {
                    failed = true;
                    results.push(status(code, Some("operation failed")));
                }
            }
        }

        // Operations before the failure were rolled back as well
        if failed {
            for result in results.iter_mut().filter(|r| r.is_success()) {
                *result = status(STATUS_FAILED_DEPENDENCY, Some("dependent operation failed"));
            }
        } else {
            *documents = staged;
        }

        Ok(BatchResponse {
            success: !failed,
            results,
        })
    }
}

fn status(status_code: u16, message: Option<&str>) -> BatchOperationResponse {
    BatchOperationResponse {
        status_code,
        request_charge: 1.0,
        resource: None,
        message: message.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Patch and query evaluation
// ---------------------------------------------------------------------------

fn apply_patch(document: &mut Value, operations: &[PatchOperation]) -> AppResult<()> {
    for operation in operations {
        let path = operation.path();
        let (parent_path, leaf) = path
            .rsplit_once('/')
            .ok_or_else(|| AppError::validation(format!("bad patch path {path}")))?;
        let parent = document
            .pointer_mut(parent_path)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| AppError::validation(format!("no parent for {path}")))?;

        match operation {
            PatchOperation::Add { value, .. } | PatchOperation::Set { value, .. } => {
                parent.insert(leaf.to_string(), value.clone());
            }
            PatchOperation::Replace { value, .. } => match parent.get_mut(leaf) {
                Some(existing) => *existing = value.clone(),
                None => return Err(AppError::validation(format!("{path} does not exist"))),
            },
            PatchOperation::Remove { .. } => {
                parent.remove(leaf);
            }
            PatchOperation::Increment { value, .. } => {
                let current = parent.get(leaf).and_then(Value::as_i64).unwrap_or(0);
                let by = value
                    .as_i64()
                    .ok_or_else(|| AppError::validation("increment requires an integer"))?;
                parent.insert(leaf.to_string(), Value::from(current + by));
            }
        }
    }
    Ok(())
}

fn evaluate(query: &QuerySpec, documents: Vec<Value>) -> AppResult<Vec<Value>> {
    let unsupported = || AppError::internal(format!("fake store cannot evaluate: {}", query.query));

    let (count, rest) = if let Some(rest) = query.query.strip_prefix("SELECT VALUE COUNT(1) FROM c") {
        (true, rest)
    } else if let Some(rest) = query.query.strip_prefix("SELECT * FROM c") {
        (false, rest)
    } else {
        return Err(unsupported());
    };

    let (rest, paging) = match rest.split_once(" OFFSET ") {
        Some((head, paging)) => (head, Some(paging)),
        None => (rest, None),
    };
    let (rest, order) = match rest.split_once(" ORDER BY ") {
        Some((head, order)) => (head, Some(order)),
        None => (rest, None),
    };

    let mut matched = documents;
    if let Some(condition) = rest.strip_prefix(" WHERE ") {
        let clauses = equality_clauses(condition, query).ok_or_else(unsupported)?;
        matched.retain(|doc| {
            clauses
                .iter()
                .all(|(path, expected)| lookup(doc, path) == Some(*expected))
        });
    } else if !rest.is_empty() {
        return Err(unsupported());
    }

    if count {
        return Ok(vec![Value::from(matched.len())]);
    }

    if let Some(order) = order {
        let (path, direction) = order.split_once(' ').ok_or_else(unsupported)?;
        let path = path.strip_prefix("c.").ok_or_else(unsupported)?;
        matched.sort_by(|a, b| compare(lookup(a, path), lookup(b, path)));
        if direction == "DESC" {
            matched.reverse();
        }
    }

    if let Some(paging) = paging {
        let (skip, take) = paging.split_once(" LIMIT ").ok_or_else(unsupported)?;
        let skip: usize = skip.parse().map_err(|_| unsupported())?;
        let take: usize = take.parse().map_err(|_| unsupported())?;
        matched = matched.into_iter().skip(skip).take(take).collect();
    }

    Ok(matched)
}

/// `c.a = @param0 AND (c.b = @param1 ...)` as (path, value) pairs.
fn equality_clauses<'q>(condition: &str, query: &'q QuerySpec) -> Option<Vec<(String, &'q Value)>> {
    let cleaned: String = condition.chars().filter(|c| *c != '(' && *c != ')').collect();
    if cleaned.contains(" OR ") || cleaned.contains("NOT ") {
        return None;
    }

    cleaned
        .split(" AND ")
        .map(|clause| {
            let (field, param) = clause.trim().split_once(" = ")?;
            let path = field.strip_prefix("c.")?.to_string();
            Some((path, query.parameter(param.trim())?))
        })
        .collect()
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |node, segment| node.get(segment))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => CmpOrdering::Greater,
        (None, Some(_)) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}
