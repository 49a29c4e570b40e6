//! Document type to container catalog.
//!
//! This is the single source of truth for where each document type lives.
//! Repositories and batches both resolve through [`container_for`].

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::constants::*;
use crate::error::{DomainError, DomainResult};

/// Where a document type is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerMapping {
    /// Container name
    pub container: &'static str,
    /// Partition key path, e.g. `/userId`
    pub partition_key_path: &'static str,
}

impl ContainerMapping {
    const fn new(container: &'static str, partition_key_path: &'static str) -> Self {
        Self {
            container,
            partition_key_path,
        }
    }

    /// Partition key path split into its property segments.
    ///
    /// `/profile/ownerId` yields `["profile", "ownerId"]`.
    pub fn partition_key_segments(&self) -> impl Iterator<Item = &'static str> {
        self.partition_key_path
            .split('/')
            .filter(|segment| !segment.is_empty())
    }
}

// Buddy documents live in their own container. An older mapping placed them in
// the Personas container; keep this table as the only mapping.
const DOCUMENT_CONTAINERS: &[(&str, ContainerMapping)] = &[
    (TYPE_USER, ContainerMapping::new(CONTAINER_USERS, PARTITION_BY_ID)),
    (TYPE_PERSONA, ContainerMapping::new(CONTAINER_PERSONAS, PARTITION_BY_USER)),
    (TYPE_BUDDY, ContainerMapping::new(CONTAINER_BUDDIES, PARTITION_BY_USER)),
    (TYPE_GOAL, ContainerMapping::new(CONTAINER_GOALS, PARTITION_BY_USER)),
    (TYPE_TASK, ContainerMapping::new(CONTAINER_TASKS, PARTITION_BY_USER)),
    (TYPE_CONVERSATION, ContainerMapping::new(CONTAINER_CONVERSATIONS, PARTITION_BY_USER)),
    (TYPE_ANALYTICS_EVENT, ContainerMapping::new(CONTAINER_ANALYTICS, PARTITION_BY_USER)),
];

static CATALOG: Lazy<HashMap<&'static str, ContainerMapping>> =
    Lazy::new(|| DOCUMENT_CONTAINERS.iter().copied().collect());

/// Resolve the container mapping for a logical document type name.
pub fn container_for(type_name: &str) -> DomainResult<ContainerMapping> {
    CATALOG
        .get(type_name)
        .copied()
        .ok_or_else(|| DomainError::unmapped(type_name))
}

/// All mapped document type names, in declaration order.
pub fn mapped_types() -> impl Iterator<Item = &'static str> {
    DOCUMENT_CONTAINERS.iter().map(|(name, _)| *name)
}
