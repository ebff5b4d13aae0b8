use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::cache::{keys, Cache};
use crate::domain::{diff_entries, sort_orders, AuditEntry, NewOrder, Order, OrderStatus, SortField};
use crate::errors::CoreError;
use crate::notify::{NotificationSink, OrderEvent};
use crate::queue::WorkQueue;
use crate::store::{AuditLog, OrderRepository};
use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// Order service - the coordination hub
// ============================================================================
//
// Every mutation follows the same shape: write the canonical store and the
// audit log (failures there abort and surface), then fan out the secondary
// side effects (cache refresh, prefix invalidation, queue publish,
// broadcast). The secondary systems may fail or lag without changing the
// result the caller sees; the store is the only source of truth.
//
// ============================================================================

/// Actor recorded on audit entries written by the pipeline itself rather
/// than on behalf of a caller.
pub const SYSTEM_ACTOR: &str = "system";

const SEARCH_TERMS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    audit: Arc<dyn AuditLog>,
    cache: Arc<dyn Cache>,
    queue: Arc<dyn WorkQueue>,
    sink: Arc<dyn NotificationSink>,
    cache_ttl: Duration,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        audit: Arc<dyn AuditLog>,
        cache: Arc<dyn Cache>,
        queue: Arc<dyn WorkQueue>,
        sink: Arc<dyn NotificationSink>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            orders,
            audit,
            cache,
            queue,
            sink,
            cache_ttl,
        }
    }

    pub async fn create(&self, new_order: NewOrder, actor: &str) -> Result<Order, CoreError> {
        let order = Order::from_new(new_order);
        order.validate()?;

        self.orders.insert(&order).await?;
        self.audit.append(&AuditEntry::creation(&order, actor)).await?;

        tracing::info!(order_id = %order.id, customer = %order.customer, "order created");

        self.enqueue(&order.id.to_string()).await;
        self.publish_detail(&order).await;
        self.invalidate_derived().await;
        self.sink.broadcast(OrderEvent::Created(order.clone())).await;

        Ok(order)
    }

    /// Persists caller-supplied changes, writing one audit entry per field
    /// that differs from the stored record. Any edit re-enqueues a
    /// status-advance message for the order, status-related or not.
    pub async fn update(&self, mut order: Order, actor: &str) -> Result<Order, CoreError> {
        order.validate()?;

        let existing = self
            .orders
            .fetch(order.id)
            .await?
            .ok_or(CoreError::NotFound(order.id))?;

        if order.status != existing.status && !existing.status.allows(order.status) {
            return Err(CoreError::Validation(format!(
                "illegal status transition {} -> {}",
                existing.status, order.status
            )));
        }

        for entry in diff_entries(&existing, &order, actor) {
            self.audit.append(&entry).await?;
        }

        order.created_at = existing.created_at; // set once, never edited
        order.updated_at = Some(Utc::now());
        let stored = self.orders.update(&order).await?;

        tracing::info!(order_id = %stored.id, version = stored.version, "order updated");

        self.enqueue(&stored.id.to_string()).await;
        self.publish_detail(&stored).await;
        self.invalidate_derived().await;
        self.sink.broadcast(OrderEvent::Updated(stored.clone())).await;

        Ok(stored)
    }

    /// Advances an order's status on behalf of the pipeline. A same-status
    /// call still writes a redundant audit entry; a backward or skipping
    /// transition becomes a logged no-op so redelivered messages that replay
    /// an earlier attempt stay harmless.
    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, CoreError> {
        let mut order = self
            .orders
            .fetch(id)
            .await?
            .ok_or(CoreError::NotFound(id))?;

        if !order.status.allows(status) {
            tracing::warn!(
                order_id = %id,
                from = %order.status,
                to = %status,
                "ignoring out-of-order status transition"
            );
            return Ok(order);
        }

        let previous = order.status;
        order.status = status;
        order.updated_at = Some(Utc::now());
        let stored = self.orders.update(&order).await?;

        self.audit
            .append(&AuditEntry::status_change(id, previous, status, SYSTEM_ACTOR))
            .await?;

        tracing::info!(order_id = %id, from = %previous, to = %status, "order status updated");

        self.publish_detail(&stored).await;
        self.invalidate_derived().await;
        self.enqueue(&format!("Order {} moved to {}", id, status.label()))
            .await;
        self.sink
            .broadcast(OrderEvent::StatusUpdated(stored.clone()))
            .await;

        Ok(stored)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        let order = self
            .orders
            .fetch(id)
            .await?
            .ok_or(CoreError::NotFound(id))?;

        self.orders.delete(id).await?;

        tracing::info!(order_id = %id, customer = %order.customer, "order deleted");

        self.cache.remove(&keys::order_detail(id)).await;
        self.invalidate_derived().await;
        self.enqueue(&format!("Order {id} deleted")).await;
        self.sink.broadcast(OrderEvent::Deleted { id }).await;

        Ok(())
    }

    /// Cache-first read; a miss falls through to the store and repopulates
    /// the detail entry.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, CoreError> {
        let key = keys::order_detail(id);
        if let Some(raw) = self.cache.get(&key).await {
            match serde_json::from_str::<Order>(&raw) {
                Ok(order) => return Ok(Some(order)),
                Err(err) => {
                    tracing::warn!(%key, error = %err, "discarding undecodable cache entry")
                }
            }
        }

        let order = self.orders.fetch(id).await?;
        if let Some(order) = &order {
            self.publish_detail(order).await;
        }
        Ok(order)
    }

    /// Cache-first list keyed by the normalized search term, sort field and
    /// direction. Misses query the store, sort in memory and repopulate.
    pub async fn list(
        &self,
        search: Option<&str>,
        sort_by: &str,
        descending: bool,
    ) -> Result<Vec<Order>, CoreError> {
        let key = keys::order_list(search, sort_by, descending);
        if let Some(raw) = self.cache.get(&key).await {
            match serde_json::from_str::<Vec<Order>>(&raw) {
                Ok(orders) => return Ok(orders),
                Err(err) => {
                    tracing::warn!(%key, error = %err, "discarding undecodable cache entry")
                }
            }
        }

        let mut orders = self.orders.search(search).await?;
        sort_orders(&mut orders, SortField::parse(sort_by), descending);

        if let Ok(raw) = serde_json::to_string(&orders) {
            self.cache.set(&key, &raw, Some(self.cache_ttl)).await;
        }
        self.track_search_term(search).await;

        Ok(orders)
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<AuditEntry>, CoreError> {
        Ok(self.audit.list_by_order(id).await?)
    }

    async fn publish_detail(&self, order: &Order) {
        match serde_json::to_string(order) {
            Ok(raw) => {
                self.cache
                    .set(&keys::order_detail(order.id), &raw, Some(self.cache_ttl))
                    .await;
            }
            Err(err) => {
                tracing::warn!(order_id = %order.id, error = %err, "failed to serialize order for cache");
            }
        }
    }

    /// List and summary entries are derived data; any mutation blows them
    /// all away by prefix.
    async fn invalidate_derived(&self) {
        self.cache.invalidate_prefix(keys::ORDER_LIST_PREFIX).await;
        self.cache.invalidate_prefix(keys::SUMMARY_PREFIX).await;
    }

    /// Best effort with a short retry budget; a broker outage must never
    /// fail the mutation that triggered the publish.
    async fn enqueue(&self, payload: &str) {
        let result =
            retry_with_backoff(RetryConfig::best_effort(), || self.queue.publish(payload)).await;
        if let Err(err) = result {
            tracing::warn!(error = %err, payload, "dropping queue message after retries");
        }
    }

    /// Accumulates normalized search terms for the dashboard collaborator.
    async fn track_search_term(&self, search: Option<&str>) {
        let term = keys::normalize_term(search);
        let mut terms: HashSet<String> = match self.cache.get(keys::SEARCH_TERMS_KEY).await {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => HashSet::new(),
        };
        if terms.insert(term) {
            if let Ok(raw) = serde_json::to_string(&terms) {
                self.cache
                    .set(keys::SEARCH_TERMS_KEY, &raw, Some(SEARCH_TERMS_TTL))
                    .await;
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domain::audit::{CREATION_FIELD, STATUS_FIELD};
    use crate::notify::Fanout;
    use crate::queue::MemoryQueue;
    use crate::store::MemoryStore;

    struct Harness {
        service: OrderService,
        cache: Arc<MemoryCache>,
        queue: Arc<MemoryQueue>,
        fanout: Arc<Fanout>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let queue = Arc::new(MemoryQueue::new());
        let fanout = Arc::new(Fanout::new(16));
        let service = OrderService::new(
            store.clone(),
            store,
            cache.clone(),
            queue.clone(),
            fanout.clone(),
            Duration::from_secs(60),
        );
        Harness {
            service,
            cache,
            queue,
            fanout,
        }
    }

    fn new_order(customer: &str, product: &str, amount: &str) -> NewOrder {
        NewOrder {
            customer: customer.to_string(),
            product: product.to_string(),
            amount: amount.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let h = harness();
        let blank = h.service.create(new_order("", "Widget", "10.00"), "tester").await;
        assert!(matches!(blank, Err(CoreError::Validation(_))));

        let negative = h
            .service
            .create(new_order("Ana", "Widget", "-1.00"), "tester")
            .await;
        assert!(matches!(negative, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn create_persists_audits_and_fans_out() {
        let h = harness();
        let mut events = h.fanout.subscribe();

        let order = h
            .service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);

        let history = h.service.history(order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].field, CREATION_FIELD);
        assert_eq!(history[0].changed_by, "tester");

        // detail entry is published immediately
        assert!(h.cache.exists(&keys::order_detail(order.id)).await);

        // the status-advance message carries the order id
        let delivery = h.queue.receive().await.unwrap().expect("message enqueued");
        assert_eq!(delivery.payload, order.id.to_string());

        let event = events.try_recv().expect("created event broadcast");
        assert_eq!(event.kind(), "created");
        assert_eq!(event.order_id(), order.id);
    }

    #[tokio::test]
    async fn update_of_missing_order_reports_not_found() {
        let h = harness();
        let ghost = Order::from_new(new_order("Ana", "Widget", "10.00"));
        assert!(matches!(
            h.service.update(ghost, "tester").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_writes_one_audit_entry_per_changed_field() {
        let h = harness();
        let order = h
            .service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();

        let mut edited = order.clone();
        edited.customer = "Bea".to_string();
        edited.amount = "150.00".parse().unwrap();
        let stored = h.service.update(edited, "editor").await.unwrap();
        assert!(stored.updated_at.is_some());

        let history = h.service.history(order.id).await.unwrap();
        // creation plus two field changes
        assert_eq!(history.len(), 3);

        let customer = history.iter().find(|e| e.field == "Customer").unwrap();
        assert_eq!(customer.old_value, "Ana");
        assert_eq!(customer.new_value, "Bea");
        assert_eq!(customer.changed_by, "editor");

        let amount = history.iter().find(|e| e.field == "Amount").unwrap();
        assert_eq!(amount.old_value, "100.00");
        assert_eq!(amount.new_value, "150.00");
    }

    #[tokio::test]
    async fn update_rejects_backward_status_transitions() {
        let h = harness();
        let order = h
            .service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();
        let stored = h
            .service
            .update_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();

        let mut regressed = stored.clone();
        regressed.status = OrderStatus::Pending;
        assert!(matches!(
            h.service.update(regressed, "tester").await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn same_status_update_still_writes_a_redundant_entry() {
        let h = harness();
        let order = h
            .service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();

        h.service
            .update_status(order.id, OrderStatus::Pending)
            .await
            .unwrap();

        let history = h.service.history(order.id).await.unwrap();
        assert_eq!(history.len(), 2);
        let status = history.iter().find(|e| e.field == STATUS_FIELD).unwrap();
        assert_eq!(status.old_value, "Pending");
        assert!(status.new_value.starts_with("Pending - "));
        assert_eq!(status.changed_by, SYSTEM_ACTOR);
    }

    #[tokio::test]
    async fn out_of_order_status_transition_is_a_noop() {
        let h = harness();
        let order = h
            .service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();
        h.service
            .update_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        h.service
            .update_status(order.id, OrderStatus::Completed)
            .await
            .unwrap();
        let entries_before = h.service.history(order.id).await.unwrap().len();

        // a redelivered message replaying the first transition
        let stored = h
            .service
            .update_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();

        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(h.service.history(order.id).await.unwrap().len(), entries_before);
    }

    #[tokio::test]
    async fn status_update_of_missing_order_reports_not_found() {
        let h = harness();
        assert!(matches!(
            h.service
                .update_status(Uuid::new_v4(), OrderStatus::Processing)
                .await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_history_and_broadcasts_the_id() {
        let h = harness();
        let order = h
            .service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();
        let mut events = h.fanout.subscribe();

        h.service.delete(order.id).await.unwrap();

        assert!(h.service.get_by_id(order.id).await.unwrap().is_none());
        assert!(h.service.history(order.id).await.unwrap().is_empty());
        assert!(!h.cache.exists(&keys::order_detail(order.id)).await);

        let event = events.try_recv().expect("deleted event broadcast");
        assert_eq!(event.kind(), "deleted");
        assert_eq!(event.order_id(), order.id);
    }

    #[tokio::test]
    async fn delete_of_missing_order_has_no_side_effects() {
        let h = harness();
        let mut events = h.fanout.subscribe();
        let ghost = Uuid::new_v4();

        assert!(matches!(
            h.service.delete(ghost).await,
            Err(CoreError::NotFound(_))
        ));

        assert!(h.service.history(ghost).await.unwrap().is_empty());
        assert!(events.try_recv().is_none());
        assert!(h.queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_by_id_is_identical_from_cache_and_store() {
        let h = harness();
        let order = h
            .service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();

        let from_cache = h.service.get_by_id(order.id).await.unwrap().unwrap();
        h.cache.remove(&keys::order_detail(order.id)).await;
        let from_store = h.service.get_by_id(order.id).await.unwrap().unwrap();

        assert_eq!(from_cache, from_store);
        // the miss repopulated the detail entry
        assert!(h.cache.exists(&keys::order_detail(order.id)).await);
    }

    #[tokio::test]
    async fn list_results_never_go_stale_after_a_mutation() {
        let h = harness();
        h.service
            .create(new_order("Ana", "Widget", "100.00"), "tester")
            .await
            .unwrap();

        assert_eq!(h.service.list(None, "customer", false).await.unwrap().len(), 1);

        h.service
            .create(new_order("Bea", "Gadget", "50.00"), "tester")
            .await
            .unwrap();

        // the second create invalidated the cached list
        assert_eq!(h.service.list(None, "customer", false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_sorts_by_the_requested_field() {
        let h = harness();
        for (customer, product, amount) in [
            ("Cid", "Sprocket", "100.00"),
            ("Ana", "Widget", "200.00"),
            ("Bea", "Gadget", "50.00"),
        ] {
            h.service
                .create(new_order(customer, product, amount), "tester")
                .await
                .unwrap();
        }

        let by_amount = h.service.list(None, "amount", true).await.unwrap();
        let amounts: Vec<String> = by_amount.iter().map(|o| o.amount.to_string()).collect();
        assert_eq!(amounts, vec!["200.00", "100.00", "50.00"]);

        let filtered = h.service.list(Some("ana"), "customer", false).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].customer, "Ana");
    }

    #[tokio::test]
    async fn list_tracks_normalized_search_terms() {
        let h = harness();
        h.service.list(Some("  Ana "), "customer", false).await.unwrap();
        h.service.list(None, "customer", false).await.unwrap();

        let raw = h.cache.get(keys::SEARCH_TERMS_KEY).await.unwrap();
        let terms: HashSet<String> = serde_json::from_str(&raw).unwrap();
        assert!(terms.contains("ana"));
        assert!(terms.contains("all"));
    }
}
