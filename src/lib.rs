//! Asynchronous order-processing pipeline.
//!
//! The [`service::OrderService`] coordinates every order mutation across the
//! canonical store, the append-only audit trail, a fail-open TTL cache, an
//! at-least-once work queue and a broadcast fanout. The
//! [`worker::StatusWorker`] drains that queue in the background and walks
//! each order from Pending through Processing to Completed.

pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod queue;
pub mod service;
pub mod store;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use errors::CoreError;
pub use service::OrderService;
pub use worker::{SimulatedWork, StatusWorker};
