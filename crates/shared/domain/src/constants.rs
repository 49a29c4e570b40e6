//! Domain-level constants.
//!
//! Logical document type names and the containers they live in.

// =============================================================================
// Document Types
// =============================================================================

pub const TYPE_USER: &str = "User";
pub const TYPE_PERSONA: &str = "Persona";
pub const TYPE_BUDDY: &str = "Buddy";
pub const TYPE_GOAL: &str = "Goal";
pub const TYPE_TASK: &str = "Task";
pub const TYPE_CONVERSATION: &str = "Conversation";
pub const TYPE_ANALYTICS_EVENT: &str = "AnalyticsEvent";

// =============================================================================
// Containers
// =============================================================================

pub const CONTAINER_USERS: &str = "Users";
pub const CONTAINER_PERSONAS: &str = "Personas";
pub const CONTAINER_BUDDIES: &str = "Buddies";
pub const CONTAINER_GOALS: &str = "Goals";
pub const CONTAINER_TASKS: &str = "Tasks";
pub const CONTAINER_CONVERSATIONS: &str = "Conversations";
pub const CONTAINER_ANALYTICS: &str = "Analytics";

// =============================================================================
// Partition Keys
// =============================================================================

/// Users are partitioned by their own id
pub const PARTITION_BY_ID: &str = "/id";

/// Everything owned by a user is co-located with that user
pub const PARTITION_BY_USER: &str = "/userId";

// =============================================================================
// Retention
// =============================================================================

/// Conversation history expires after 90 days
pub const CONVERSATION_TTL_SECONDS: i32 = 90 * 24 * 60 * 60;

/// Raw analytics events expire after 365 days
pub const ANALYTICS_TTL_SECONDS: i32 = 365 * 24 * 60 * 60;
