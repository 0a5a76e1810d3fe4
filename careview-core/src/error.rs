//! Error types for CAREVIEW operations

use crate::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Layer store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Conflict on {entity_type}: {reason}")]
    Conflict { entity_type: EntityType, reason: String },

    #[error("Duplicate slug: {slug}")]
    DuplicateSlug { slug: String },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Cache errors. Always non-fatal: the layer store holds the correct
/// answer, so callers degrade to recompute-on-every-read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Validation errors for malformed patches and transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },
}

/// Authorization errors surfaced to the caller. The engine assumes the
/// caller has already resolved role-in-tenant; this covers the scope checks
/// the engine can make on its own, e.g. a tenant acting on another tenant's
/// custom item.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Forbidden: tenant {tenant_id} may not {action} {resource}")]
    Forbidden {
        tenant_id: Uuid,
        action: String,
        resource: String,
    },
}

/// Master error type for all CAREVIEW errors.
#[derive(Debug, Clone, Error)]
pub enum CareviewError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),
}

impl CareviewError {
    /// Cache failures are an optimization loss, never a correctness loss;
    /// the engine swallows them and recomputes from the layer store.
    pub fn is_cache_error(&self) -> bool {
        matches!(self, CareviewError::Cache(_))
    }
}

/// Result type alias for CAREVIEW operations.
pub type CareviewResult<T> = Result<T, CareviewError>;

// =============================================================================
// TESTS
// =============================================================================
