//! Connection management - the single owner of the store client.
//!
//! [`ConnectionManager`] resolves container handles (cached per container
//! name, created exactly once), runs health checks and keeps connection
//! statistics. Statistics are mutated under one lock and handed out as
//! snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::constants::STATS_REFRESH_INTERVAL_SECONDS;
use common::{AppError, AppResult, ConnectionConfig, ConnectionMode};
use domain::{container_for, ContainerMapping, Document};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::store::{ContainerClient, StoreClient};

/// Resolved, reusable reference to one container.
pub struct ContainerHandle {
    name: String,
    client: Arc<dyn ContainerClient>,
}

impl ContainerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Arc<dyn ContainerClient> {
        &self.client
    }
}

impl std::fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Result of the most recent health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheck {
    pub healthy: bool,
    pub latency: Duration,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
struct ConnectionStats {
    container_references: usize,
    health_checks: u64,
    last_health_check: Option<HealthCheck>,
    last_updated: DateTime<Utc>,
}

/// Immutable copy of the connection statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatsSnapshot {
    pub endpoint: String,
    pub database: String,
    pub connection_mode: ConnectionMode,
    pub max_connections_per_endpoint: u32,
    /// Distinct container handles created so far
    pub container_references: usize,
    pub health_checks: u64,
    pub last_health_check: Option<HealthCheck>,
    pub last_updated: DateTime<Utc>,
}

/// Owner of the store client and the container handle cache.
pub struct ConnectionManager {
    client: Arc<dyn StoreClient>,
    config: ConnectionConfig,
    containers: Mutex<HashMap<String, Arc<ContainerHandle>>>,
    stats: Arc<Mutex<ConnectionStats>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl ConnectionManager {
    /// Create a manager without background work.
    ///
    /// Fails with every configuration violation if the config is invalid.
    pub fn new(client: Arc<dyn StoreClient>, config: ConnectionConfig) -> AppResult<Self> {
        config.validate_all()?;

        Ok(Self {
            client,
            config,
            containers: Mutex::new(HashMap::new()),
            stats: Arc::new(Mutex::new(ConnectionStats {
                container_references: 0,
                health_checks: 0,
                last_health_check: None,
                last_updated: Utc::now(),
            })),
            refresh_task: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// Create a shared manager and start the periodic stats refresh.
    pub fn connect(client: Arc<dyn StoreClient>, config: ConnectionConfig) -> AppResult<Arc<Self>> {
        let manager = Arc::new(Self::new(client, config)?);
        manager.start_stats_refresh(Duration::from_secs(STATS_REFRESH_INTERVAL_SECONDS));

        tracing::info!(
            endpoint = %manager.config.endpoint,
            database = %manager.config.database_name,
            mode = %manager.config.connection_mode,
            "Document store connection initialized"
        );
        Ok(manager)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.client
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Container handle for a document type.
    pub fn container_for<T: Document>(&self) -> AppResult<Arc<ContainerHandle>> {
        self.container_for_type(T::TYPE_NAME)
    }

    /// Container handle for a logical document type name.
    pub fn container_for_type(&self, type_name: &str) -> AppResult<Arc<ContainerHandle>> {
        let mapping: ContainerMapping = container_for(type_name)?;
        self.container(mapping.container)
    }

    /// Container handle by container name, created on first use.
    ///
    /// Concurrent first calls for the same name construct exactly one handle
    /// and all callers receive that instance.
    pub fn container(&self, name: &str) -> AppResult<Arc<ContainerHandle>> {
        let mut containers = self.containers.lock();
        // dispose() flips the flag before it clears the cache under this lock
        if self.is_disposed() {
            return Err(AppError::configuration("connection disposed"));
        }
        if let Some(handle) = containers.get(name) {
            return Ok(handle.clone());
        }

        let handle = Arc::new(ContainerHandle {
            name: name.to_string(),
            client: self.client.container(&self.config.database_name, name),
        });
        containers.insert(name.to_string(), handle.clone());

        {
            let mut stats = self.stats.lock();
            stats.container_references = containers.len();
            stats.last_updated = Utc::now();
        }
        drop(containers);

        tracing::debug!(container = name, "Container handle created");
        Ok(handle)
    }

    /// Lightweight existence read against the database.
    ///
    /// Store failures, including the timeout expiring, are reported as `false`
    /// and recorded in the stats. Local errors propagate.
    pub async fn test_connection(&self, timeout: Duration) -> AppResult<bool> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, self.client.read_database(&self.config.database_name))
            .await
            .unwrap_or_else(|_| Err(AppError::Timeout(format!("health check exceeded {:?}", timeout))));
        let latency = started.elapsed();

        let (healthy, error) = match outcome {
            Ok(()) => (true, None),
            Err(err) if err.is_store_failure() => (false, Some(err.to_string())),
            Err(err) => {
                self.record_health_check(false, latency, Some(err.to_string()));
                return Err(err);
            }
        };

        if let Some(error) = &error {
            tracing::warn!(latency_ms = latency.as_millis() as u64, %error, "Connection test failed");
        } else {
            tracing::debug!(latency_ms = latency.as_millis() as u64, "Connection test succeeded");
        }

        self.record_health_check(healthy, latency, error);
        Ok(healthy)
    }

    fn record_health_check(&self, healthy: bool, latency: Duration, error: Option<String>) {
        let now = Utc::now();
        let mut stats = self.stats.lock();
        stats.health_checks += 1;
        stats.last_health_check = Some(HealthCheck {
            healthy,
            latency,
            checked_at: now,
            error,
        });
        stats.last_updated = now;
    }

    /// Copy of the current statistics.
    pub fn stats(&self) -> ConnectionStatsSnapshot {
        let stats = self.stats.lock();
        ConnectionStatsSnapshot {
            endpoint: self.config.endpoint.clone(),
            database: self.config.database_name.clone(),
            connection_mode: self.config.connection_mode,
            max_connections_per_endpoint: self.config.max_connections_per_endpoint,
            container_references: stats.container_references,
            health_checks: stats.health_checks,
            last_health_check: stats.last_health_check.clone(),
            last_updated: stats.last_updated,
        }
    }

    /// Start refreshing the stats timestamp periodically.
    ///
    /// Does nothing outside a tokio runtime or when already running.
    pub fn start_stats_refresh(&self, interval: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, stats refresh disabled");
            return;
        };

        let mut task = self.refresh_task.lock();
        if task.is_some() || self.is_disposed() {
            return;
        }

        let stats = Arc::clone(&self.stats);
        *task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                stats.lock().last_updated = Utc::now();
                tracing::trace!("Connection stats refreshed");
            }
        }));
    }

    /// Release the store client and stop background work. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(task) = self.refresh_task.lock().take() {
            task.abort();
        }
        {
            let mut containers = self.containers.lock();
            containers.clear();
            let mut stats = self.stats.lock();
            stats.container_references = 0;
            stats.last_updated = Utc::now();
        }
        self.client.dispose();

        tracing::info!("Document store connection disposed");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.get_mut().take() {
            task.abort();
        }
    }
}
