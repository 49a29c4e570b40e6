//! One-time database and container bootstrap.

use std::sync::Arc;

use common::AppResult;
use domain::{container_definitions, ContainerDefinition, DomainError};

use crate::connection::ConnectionManager;

/// Creates the database and containers if they are missing.
///
/// Every step is idempotent; running it against an existing database only
/// performs existence checks.
pub struct Provisioner {
    connection: Arc<ConnectionManager>,
}

impl Provisioner {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    /// Create the database, with the configured autoscale ceiling. Returns
    /// true when it did not exist before.
    pub async fn ensure_database(&self) -> AppResult<bool> {
        let config = self.connection.config();
        let created = self
            .connection
            .client()
            .create_database_if_not_exists(&config.database_name, config.autoscale_max_throughput)
            .await?;

        if created {
            tracing::info!(
                database = %config.database_name,
                autoscale_max_throughput = config.autoscale_max_throughput,
                "Database created"
            );
        }
        Ok(created)
    }

    /// Create missing containers; returns the names of those created.
    pub async fn ensure_containers(&self, definitions: &[ContainerDefinition]) -> AppResult<Vec<String>> {
        if let Some(bad) = definitions.iter().find(|d| !d.partition_key_path.starts_with('/')) {
            return Err(DomainError::InvalidPartitionKeyPath(bad.partition_key_path.clone()).into());
        }

        let database = &self.connection.config().database_name;
        let mut created = Vec::new();

        for definition in definitions {
            if self
                .connection
                .client()
                .create_container_if_not_exists(database, definition)
                .await?
            {
                tracing::info!(
                    container = %definition.name,
                    partition_key = %definition.partition_key_path,
                    ttl = definition.default_ttl_seconds,
                    "Container created"
                );
                created.push(definition.name.clone());
            }
        }

        Ok(created)
    }

    /// Database plus every catalog container.
    pub async fn provision(&self) -> AppResult<Vec<String>> {
        self.ensure_database().await?;
        self.ensure_containers(&container_definitions()).await
    }
}
