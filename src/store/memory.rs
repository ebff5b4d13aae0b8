use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditLog, OrderRepository, StoreError};
use crate::domain::{AuditEntry, Order};

// ============================================================================
// In-memory store
// ============================================================================
//
// Backs tests and single-process deployments. Orders and audit rows sit
// behind one lock so a delete removes the parent and its children
// atomically.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    audit: HashMap<Uuid, Vec<AuditEntry>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::AlreadyExists(order.id));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn search(&self, term: Option<&str>) -> Result<Vec<Order>, StoreError> {
        let needle = term
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|order| match &needle {
                Some(n) => {
                    order.customer.to_lowercase().contains(n)
                        || order.product.to_lowercase().contains(n)
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update(&self, order: &Order) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;
        let current = tables
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::NotFound(order.id))?;
        if current.version != order.version {
            return Err(StoreError::Conflict(order.id));
        }
        let mut stored = order.clone();
        stored.version += 1;
        *current = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        // children first, then the parent, under the same lock
        tables.audit.remove(&id);
        tables.orders.remove(&id).ok_or(StoreError::NotFound(id))?;
        Ok(())
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .audit
            .entry(entry.order_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, StoreError> {
        let tables = self.tables.read().await;
        let mut entries = tables.audit.get(&order_id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(entries)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
