//! Declarative container definitions used when provisioning a database.

use serde::{Deserialize, Serialize};

use crate::catalog::{container_for, mapped_types};
use crate::constants::*;

/// Indexing paths for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingPolicy {
    pub included_paths: Vec<String>,
    pub excluded_paths: Vec<String>,
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            included_paths: vec!["/*".to_string()],
            excluded_paths: vec!["/\"_etag\"/?".to_string()],
        }
    }
}

/// Container definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub partition_key_path: String,
    /// Per-document time to live in seconds; `None` disables expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl_seconds: Option<i32>,
    pub indexing_policy: IndexingPolicy,
}

impl ContainerDefinition {
    pub fn new(name: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key_path: partition_key_path.into(),
            default_ttl_seconds: None,
            indexing_policy: IndexingPolicy::default(),
        }
    }

    pub fn with_ttl(mut self, seconds: i32) -> Self {
        self.default_ttl_seconds = Some(seconds);
        self
    }

    pub fn exclude_path(mut self, path: impl Into<String>) -> Self {
        self.indexing_policy.excluded_paths.push(path.into());
        self
    }
}

/// Definitions for every container in the catalog, one per container.
pub fn container_definitions() -> Vec<ContainerDefinition> {
    let mut definitions: Vec<ContainerDefinition> = Vec::new();

    for type_name in mapped_types() {
        let Ok(mapping) = container_for(type_name) else {
            continue;
        };
        if definitions.iter().any(|d| d.name == mapping.container) {
            continue;
        }

        let definition = ContainerDefinition::new(mapping.container, mapping.partition_key_path);
        let definition = match mapping.container {
            CONTAINER_CONVERSATIONS => definition
                .with_ttl(CONVERSATION_TTL_SECONDS)
                .exclude_path("/messages/*"),
            CONTAINER_ANALYTICS => definition
                .with_ttl(ANALYTICS_TTL_SECONDS)
                .exclude_path("/payload/*"),
            _ => definition,
        };
        definitions.push(definition);
    }

    definitions
}
