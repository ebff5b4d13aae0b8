use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{AuditLog, OrderRepository, StoreError};
use crate::domain::{AuditEntry, Order, OrderStatus};

// ============================================================================
// Postgres store
// ============================================================================
//
// Expects two tables, owned by the deployment's migration tooling:
//
//   orders      (id uuid primary key, customer text, product text,
//                amount numeric, status smallint, created_at timestamptz,
//                updated_at timestamptz, version bigint)
//   order_audit (id uuid primary key, order_id uuid, field text,
//                old_value text, new_value text, changed_by text,
//                changed_at timestamptz)
//
// Queries are bound at runtime so the crate builds without a database.
//
// ============================================================================

const ORDER_COLUMNS: &str =
    "id, customer, product, amount, status, created_at, updated_at, version";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let code: i16 = row.try_get("status")?;
    let status = OrderStatus::from_code(code)
        .ok_or_else(|| StoreError::Backend(format!("invalid status code {code}")))?;
    Ok(Order {
        id: row.try_get("id")?,
        customer: row.try_get("customer")?,
        product: row.try_get("product")?,
        amount: row.try_get("amount")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditEntry, StoreError> {
    Ok(AuditEntry {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        field: row.try_get("field")?,
        old_value: row.try_get("old_value")?,
        new_value: row.try_get("new_value")?,
        changed_by: row.try_get("changed_by")?,
        changed_at: row.try_get("changed_at")?,
    })
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO orders (id, customer, product, amount, status, created_at, updated_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(order.id)
        .bind(&order.customer)
        .bind(&order.product)
        .bind(order.amount)
        .bind(order.status.code())
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(order.id));
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn search(&self, term: Option<&str>) -> Result<Vec<Order>, StoreError> {
        let rows = match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => {
                let pattern = format!("%{term}%");
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE customer ILIKE $1 OR product ILIKE $1"
                ))
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(order_from_row).collect()
    }

    async fn update(&self, order: &Order) -> Result<Order, StoreError> {
        let result = sqlx::query(
            "UPDATE orders \
             SET customer = $2, product = $3, amount = $4, status = $5, updated_at = $6, \
                 version = version + 1 \
             WHERE id = $1 AND version = $7",
        )
        .bind(order.id)
        .bind(&order.customer)
        .bind(&order.product)
        .bind(order.amount)
        .bind(order.status.code())
        .bind(order.updated_at)
        .bind(order.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a lost race from a deleted row.
            let exists = sqlx::query("SELECT 1 FROM orders WHERE id = $1")
                .bind(order.id)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict(order.id),
                None => StoreError::NotFound(order.id),
            });
        }

        let mut stored = order.clone();
        stored.version += 1;
        Ok(stored)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_audit WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound(id));
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AuditLog for PgStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO order_audit (id, order_id, field, old_value, new_value, changed_by, changed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id)
        .bind(entry.order_id)
        .bind(&entry.field)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.changed_by)
        .bind(entry.changed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, order_id, field, old_value, new_value, changed_by, changed_at \
             FROM order_audit WHERE order_id = $1 ORDER BY changed_at DESC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(audit_from_row).collect()
    }
}
