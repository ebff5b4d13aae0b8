// ============================================================================
// Domain Module
// ============================================================================
//
// The order record, its status lifecycle, and the audit trail recording
// every field-level change made to it. Pure data and rules; everything that
// talks to a backend lives behind the store/cache/queue seams.
//
// ============================================================================

pub mod audit;
pub mod order;

pub use audit::{diff_entries, AuditEntry};
pub use order::{sort_orders, NewOrder, Order, OrderStatus, SortField};
