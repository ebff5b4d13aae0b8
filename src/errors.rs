use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

// ============================================================================
// Error taxonomy
// ============================================================================
//
// Validation and NotFound are the caller's problem and not worth retrying.
// Conflict means a write raced a concurrent mutation or a duplicate insert.
// Persistence means the canonical store (order rows or audit rows) failed
// and the mutation was aborted. Cache, queue-publish, and notification
// failures never appear here: those paths degrade to logged no-ops so a
// transient outage cannot block an order mutation.
//
// ============================================================================

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order {0} changed concurrently")]
    Conflict(Uuid),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::NotFound(id),
            StoreError::AlreadyExists(id) | StoreError::Conflict(id) => CoreError::Conflict(id),
            StoreError::Backend(message) => CoreError::Persistence(message),
        }
    }
}
