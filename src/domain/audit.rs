use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{Order, OrderStatus};

// ============================================================================
// Audit trail - immutable field-level change records
// ============================================================================
//
// One entry per changed field per mutation, plus a synthetic "creation"
// entry summarizing the initial values. Entries are never updated or
// deleted; they only go away when the parent order is deleted (cascade).
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

/// Field name of the synthetic entry written when an order is created.
pub const CREATION_FIELD: &str = "creation";
/// Field name shared by every status transition entry.
pub const STATUS_FIELD: &str = "Status";

impl AuditEntry {
    pub fn field_change(
        order_id: Uuid,
        field: &str,
        old_value: String,
        new_value: String,
        actor: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            field: field.to_string(),
            old_value,
            new_value,
            changed_by: actor.to_string(),
            changed_at: Utc::now(),
        }
    }

    /// Synthetic entry summarizing the initial field values of a new order.
    pub fn creation(order: &Order, actor: &str) -> Self {
        Self::field_change(
            order.id,
            CREATION_FIELD,
            "n/a".to_string(),
            format!(
                "order created - customer: {}, product: {}, amount: {}, status: {}",
                order.customer, order.product, order.amount, order.status
            ),
            actor,
        )
    }

    /// Status transition entry. The new value carries the label and the
    /// moment of the change, which is what operators see in the trail.
    pub fn status_change(order_id: Uuid, from: OrderStatus, to: OrderStatus, actor: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            field: STATUS_FIELD.to_string(),
            old_value: from.label().to_string(),
            new_value: format!("{} - {}", to.label(), now.format("%d/%m/%Y %H:%M:%S")),
            changed_by: actor.to_string(),
            changed_at: now,
        }
    }
}

/// One entry per field of {customer, product, amount, status} that differs
/// between the stored record and the incoming one.
pub fn diff_entries(existing: &Order, incoming: &Order, actor: &str) -> Vec<AuditEntry> {
    let mut entries = Vec::new();
    if existing.customer != incoming.customer {
        entries.push(AuditEntry::field_change(
            existing.id,
            "Customer",
            existing.customer.clone(),
            incoming.customer.clone(),
            actor,
        ));
    }
    if existing.product != incoming.product {
        entries.push(AuditEntry::field_change(
            existing.id,
            "Product",
            existing.product.clone(),
            incoming.product.clone(),
            actor,
        ));
    }
    if existing.amount != incoming.amount {
        entries.push(AuditEntry::field_change(
            existing.id,
            "Amount",
            existing.amount.to_string(),
            incoming.amount.to_string(),
            actor,
        ));
    }
    if existing.status != incoming.status {
        entries.push(AuditEntry::field_change(
            existing.id,
            STATUS_FIELD,
            existing.status.label().to_string(),
            incoming.status.label().to_string(),
            actor,
        ));
    }
    entries
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::NewOrder;

    fn order() -> Order {
        Order::from_new(NewOrder {
            customer: "Ana".to_string(),
            product: "Widget".to_string(),
            amount: "100.00".parse().unwrap(),
        })
    }

    #[test]
    fn creation_entry_summarizes_initial_values() {
        let order = order();
        let entry = AuditEntry::creation(&order, "tester");
        assert_eq!(entry.order_id, order.id);
        assert_eq!(entry.field, CREATION_FIELD);
        assert_eq!(entry.old_value, "n/a");
        assert!(entry.new_value.contains("customer: Ana"));
        assert!(entry.new_value.contains("status: Pending"));
        assert_eq!(entry.changed_by, "tester");
    }

    #[test]
    fn diff_produces_one_entry_per_changed_field() {
        let existing = order();
        let mut incoming = existing.clone();
        incoming.customer = "Bea".to_string();
        incoming.amount = "150.00".parse().unwrap();

        let entries = diff_entries(&existing, &incoming, "tester");
        assert_eq!(entries.len(), 2);

        let customer = entries.iter().find(|e| e.field == "Customer").unwrap();
        assert_eq!(customer.old_value, "Ana");
        assert_eq!(customer.new_value, "Bea");

        let amount = entries.iter().find(|e| e.field == "Amount").unwrap();
        assert_eq!(amount.old_value, "100.00");
        assert_eq!(amount.new_value, "150.00");
    }

    #[test]
    fn diff_of_identical_orders_is_empty() {
        let existing = order();
        assert!(diff_entries(&existing, &existing.clone(), "tester").is_empty());
    }

    #[test]
    fn status_entry_carries_label_and_timestamp() {
        let entry = AuditEntry::status_change(
            Uuid::new_v4(),
            OrderStatus::Pending,
            OrderStatus::Processing,
            "system",
        );
        assert_eq!(entry.field, STATUS_FIELD);
        assert_eq!(entry.old_value, "Pending");
        assert!(entry.new_value.starts_with("Processing - "));
    }
}
