//! # Persistence Store
//!
//! Durable storage for orders and their items. The store owns all local
//! consistency:
//!
//! - `create` writes the order row and every item row as one atomic unit.
//!   A failure at any point leaves nothing visible.
//! - `update_status` is a compare-and-set: it writes the new status and a
//!   strictly increasing `updated_at` only while the stored status is still
//!   the one the caller checked against.
//! - Reads return items in line order, so the same query always yields the
//!   same sequence.
//!
//! Whether a status change is *allowed* is not the store's business. The
//! service checks the lifecycle, then passes the status it checked as
//! `expected` so a concurrent change cannot slip between check and write.

use crate::model::{NewOrder, Order, OrderId, OrderStatus, PageRequest, UserId};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderStore;
pub use postgres::PgOrderStore;

/// Errors that can occur during persistence operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No order row matches the identifier.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// An order with the same identifier already exists.
    #[error("Order already exists: {0}")]
    Conflict(String),

    /// The stored status is no longer the expected one. Nothing was written.
    #[error("Order {id} status changed concurrently to {actual}")]
    StatusChanged { id: String, actual: OrderStatus },

    /// Any other persistence fault. The write, if any, was rolled back.
    #[error("Storage error: {0}")]
    Database(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists `order` and its items atomically, assigning an id when absent.
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get_by_id(&self, id: &OrderId) -> Result<Order, StoreError>;

    /// One page of the user's orders, newest first, plus the total count.
    async fn list(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64), StoreError>;

    /// Moves the order from `expected` to `status`, bumping `updated_at`.
    async fn update_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order, StoreError>;
}

/// Current time at the precision the database keeps (microseconds).
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// The next modification timestamp: now, but never at or before `previous`.
pub(crate) fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + TimeDelta::microseconds(1);
    now().max(floor)
}
