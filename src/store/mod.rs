use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AuditEntry, Order};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ============================================================================
// Storage seams
// ============================================================================
//
// The order store owns canonical state; everything else in the pipeline
// (cache, queue, fanout) is derived from it and may lag or be lost. Writes
// to the same order are serialized through an optimistic version check: a
// stale write fails with Conflict, a write against a deleted row with
// NotFound, never a silent overwrite.
//
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order {0} already exists")]
    AlreadyExists(Uuid),

    #[error("order {0} was modified concurrently")]
    Conflict(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a brand-new order; a duplicate id fails cleanly.
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Case-insensitive substring match over customer and product. `None`
    /// or a blank term returns everything.
    async fn search(&self, term: Option<&str>) -> Result<Vec<Order>, StoreError>;

    /// Persists `order` against its version and returns the stored record
    /// with the bumped version.
    async fn update(&self, order: &Order) -> Result<Order, StoreError>;

    /// Removes the order and its audit trail, children first, inside one
    /// unit of work.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append-only; a failure here aborts the enclosing mutation.
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    /// Entries for one order, newest first.
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, StoreError>;
}
