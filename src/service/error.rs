//! Error types for the order service.

use crate::model::{OrderId, OrderStatus};
use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur during order operations.
///
/// All of them end the current request. Nothing is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The requested order was not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The product authority rejected the item set, did not answer, or
    /// answered with something that cannot be priced.
    #[error("Order validation failed: {0}")]
    ValidationFailed(String),

    /// The request is malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The lifecycle does not allow the requested status change.
    #[error("Order {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// An underlying persistence error occurred.
    #[error("Order storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => OrderError::NotFound(OrderId::new(id)),
            other => OrderError::Storage(other.to_string()),
        }
    }
}
