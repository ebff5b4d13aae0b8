use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

// ============================================================================
// Order - the business record tracked through the processing lifecycle
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer: String,
    pub product: String,
    /// Monetary amount; decimal so cents survive arithmetic intact.
    pub amount: Decimal,
    pub status: OrderStatus,
    /// Set once at creation, never touched again.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation; `None` until the first one.
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by the store on every write.
    pub version: i64,
}

/// Caller-supplied fields for a new order. Identity and timestamps are
/// assigned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer: String,
    pub product: String,
    pub amount: Decimal,
}

impl Order {
    pub fn from_new(new: NewOrder) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer: new.customer,
            product: new.product,
            amount: new.amount,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
            version: 0,
        }
    }

    /// Validate caller-controlled fields before anything is persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.customer.trim().is_empty() {
            return Err(CoreError::Validation("customer must not be empty".into()));
        }
        if self.product.trim().is_empty() {
            return Err(CoreError::Validation("product must not be empty".into()));
        }
        if self.amount.is_sign_negative() {
            return Err(CoreError::Validation(format!(
                "amount must not be negative, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Status lifecycle
// ============================================================================

/// Fixed lifecycle: Pending → Processing → Completed. There is no backward
/// step and no skipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
        }
    }

    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Completed),
            OrderStatus::Completed => None,
        }
    }

    /// A status write is legal when it repeats the current status or takes
    /// the single next step in the lifecycle.
    pub fn allows(&self, target: OrderStatus) -> bool {
        target == *self || Some(target) == self.next()
    }

    /// Wire representation used by the relational store.
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i16) -> Option<OrderStatus> {
        match code {
            0 => Some(OrderStatus::Pending),
            1 => Some(OrderStatus::Processing),
            2 => Some(OrderStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// List sorting
// ============================================================================

/// Sort keys accepted by the list operation. Anything unrecognized falls
/// back to creation time, which is also the default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Customer,
    Product,
    Status,
    Amount,
    CreatedAt,
}

impl SortField {
    pub fn parse(raw: &str) -> SortField {
        match raw.trim().to_ascii_lowercase().as_str() {
            "customer" => SortField::Customer,
            "product" => SortField::Product,
            "status" => SortField::Status,
            "amount" => SortField::Amount,
            _ => SortField::CreatedAt,
        }
    }
}

pub fn sort_orders(orders: &mut [Order], field: SortField, descending: bool) {
    let cmp = |a: &Order, b: &Order| match field {
        SortField::Customer => a.customer.cmp(&b.customer),
        SortField::Product => a.product.cmp(&b.product),
        SortField::Status => a.status.cmp(&b.status),
        SortField::Amount => a.amount.cmp(&b.amount),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    if descending {
        orders.sort_by(|a, b| cmp(b, a));
    } else {
        orders.sort_by(cmp);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(customer: &str, product: &str, amount: &str) -> Order {
        Order::from_new(NewOrder {
            customer: customer.to_string(),
            product: product.to_string(),
            amount: amount.parse().unwrap(),
        })
    }

    #[test]
    fn new_orders_start_pending() {
        let order = order("Ana", "Widget", "100.00");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 0);
        assert!(order.updated_at.is_none());
    }

    #[test]
    fn validation_rejects_blank_fields_and_negative_amounts() {
        assert!(order("Ana", "Widget", "0").validate().is_ok());
        assert!(order("  ", "Widget", "100.00").validate().is_err());
        assert!(order("Ana", "", "100.00").validate().is_err());
        assert!(order("Ana", "Widget", "-0.01").validate().is_err());
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        assert!(OrderStatus::Pending.allows(OrderStatus::Pending));
        assert!(OrderStatus::Pending.allows(OrderStatus::Processing));
        assert!(!OrderStatus::Pending.allows(OrderStatus::Completed));
        assert!(OrderStatus::Processing.allows(OrderStatus::Completed));
        assert!(!OrderStatus::Processing.allows(OrderStatus::Pending));
        assert!(OrderStatus::Completed.allows(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.allows(OrderStatus::Processing));
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Completed,
        ] {
            assert_eq!(OrderStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(OrderStatus::from_code(7), None);
    }

    #[test]
    fn unknown_sort_field_falls_back_to_creation_time() {
        assert_eq!(SortField::parse("Amount"), SortField::Amount);
        assert_eq!(SortField::parse("nonsense"), SortField::CreatedAt);
        assert_eq!(SortField::parse(""), SortField::CreatedAt);
    }

    #[test]
    fn sorting_honors_field_and_direction() {
        let mut orders = vec![
            order("Bea", "Gadget", "50.00"),
            order("Ana", "Widget", "200.00"),
            order("Cid", "Sprocket", "100.00"),
        ];
        sort_orders(&mut orders, SortField::Amount, false);
        let amounts: Vec<String> = orders.iter().map(|o| o.amount.to_string()).collect();
        assert_eq!(amounts, vec!["50.00", "100.00", "200.00"]);

        sort_orders(&mut orders, SortField::Customer, true);
        let customers: Vec<&str> = orders.iter().map(|o| o.customer.as_str()).collect();
        assert_eq!(customers, vec!["Cid", "Bea", "Ana"]);
    }
}
