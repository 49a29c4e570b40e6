//! Store-wide constants
//!
//! Centralized location for limits imposed by the document store and the
//! defaults used when configuration leaves a value unset.

// =============================================================================
// Configuration Defaults
// =============================================================================

/// Default number of items requested per query page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default number of retries after the first attempt
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default connection pool size per endpoint
pub const DEFAULT_MAX_CONNECTIONS_PER_ENDPOINT: u32 = 50;

/// Default database name
pub const DEFAULT_DATABASE_NAME: &str = "companion";

/// Local emulator endpoint
pub const DEFAULT_ENDPOINT: &str = "https://localhost:8081";

// =============================================================================
// Store Limits
// =============================================================================

/// Maximum serialized document size accepted by the store
pub const MAX_DOCUMENT_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Maximum operations in one transactional batch
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// Maximum operations in one patch request
pub const MAX_PATCH_OPERATIONS: usize = 10;

/// Autoscale throughput must be a multiple of this value
pub const AUTOSCALE_THROUGHPUT_STEP: u32 = 1000;

// =============================================================================
// Status Codes
// =============================================================================

pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_REQUEST_TIMEOUT: u16 = 408;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_GONE: u16 = 410;
pub const STATUS_PRECONDITION_FAILED: u16 = 412;
pub const STATUS_ENTITY_TOO_LARGE: u16 = 413;
pub const STATUS_FAILED_DEPENDENCY: u16 = 424;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const STATUS_RETRY_WITH: u16 = 449;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

// =============================================================================
// Background Work
// =============================================================================

/// Interval of the connection stats refresh task
pub const STATS_REFRESH_INTERVAL_SECONDS: u64 = 60;
