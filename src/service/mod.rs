//! # Order Service
//!
//! Sequences the work behind every order operation:
//!
//! ```text
//! create_order:  validate (product authority) ─► price ─► persist (one transaction)
//! get_order:     load ─► enrich with user (best effort)
//! list_orders:   check paging ─► load page + total
//! update_status: load ─► check lifecycle ─► compare-and-set (re-check on conflict)
//! ```
//!
//! ## Authority
//!
//! Prices and names come only from the product authority's validation
//! response. Anything the caller sent about prices never reaches this layer.
//! A requested product that is absent from the response fails the request
//! (`ValidationFailed`) instead of being priced at zero or skipped.
//!
//! ## Deadlines
//!
//! Every outbound call runs under the caller's [`Deadline`]. Expiry during
//! validation is a `ValidationFailed`, expiry during a store call is a
//! `Storage` error, and expiry during enrichment just leaves the user out.
//!
//! ## Status changes
//!
//! The store only writes a new status while the stored one is still the one
//! the lifecycle check ran against. When a concurrent update got there first,
//! the check runs again against the status that won. Two racing requests can
//! therefore never move an order out of `delivered` or `cancelled`.
//!
//! ## No compensation
//!
//! Validation has no side effects on the product authority, so a failed
//! write after a successful validation simply means the order does not exist.

use crate::clients::{ProductCatalog, UserDirectory};
use crate::model::{
    ItemRequest, Money, NewOrder, Order, OrderId, OrderItem, OrderPage, OrderStatus, PageRequest,
    UnknownStatus, User, UserId,
};
use crate::store::{OrderStore, StoreError};
use order_framework::Deadline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub mod error;

pub use error::OrderError;

/// Outcome of the best-effort user lookup attached to a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UserEnrichment {
    Resolved(User),
    /// The lookup failed; the order is still returned.
    Unavailable { reason: String },
}

/// An order together with its owner, when the owner could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub user: UserEnrichment,
}

impl OrderDetails {
    pub fn user(&self) -> Option<&User> {
        match &self.user {
            UserEnrichment::Resolved(user) => Some(user),
            UserEnrichment::Unavailable { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    users: Arc<dyn UserDirectory>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            catalog,
            users,
        }
    }

    /// Validates, prices and persists a new pending order.
    #[instrument(
        skip(self, user_id, items, deadline),
        fields(user_id = %user_id, item_count = items.len())
    )]
    pub async fn create_order(
        &self,
        user_id: UserId,
        items: Vec<ItemRequest>,
        deadline: Deadline,
    ) -> Result<Order, OrderError> {
        debug!(?items, "create_order called");
        check_create(&user_id, &items)?;

        let validation = deadline
            .run(self.catalog.validate_items(&items))
            .await
            .map_err(|_| {
                OrderError::ValidationFailed("deadline exceeded while validating items".to_string())
            })?
            .map_err(|e| OrderError::ValidationFailed(e.to_string()))?;

        if !validation.valid {
            warn!("Product authority rejected the item set");
            return Err(OrderError::ValidationFailed(
                "product authority reported invalid items".to_string(),
            ));
        }

        let lines = items
            .iter()
            .map(|item| {
                let product = validation.find(&item.product_id).ok_or_else(|| {
                    OrderError::ValidationFailed(format!(
                        "product {} missing from validation response",
                        item.product_id
                    ))
                })?;
                let price = Money::from_decimal(product.price).ok_or_else(|| {
                    OrderError::ValidationFailed(format!(
                        "product {} has unusable price {}",
                        item.product_id, product.price
                    ))
                })?;
                Ok(OrderItem {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    price,
                    product_name: product.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        let new_order = NewOrder::pending(user_id, lines).ok_or_else(|| {
            OrderError::ValidationFailed("order total out of range".to_string())
        })?;
        info!(total = %new_order.total, "Items validated");

        let order = deadline
            .run(self.store.create(new_order))
            .await
            .map_err(|_| {
                OrderError::Storage("deadline exceeded while persisting order".to_string())
            })??;

        info!(order_id = %order.id, total = %order.total, "Order created");
        Ok(order)
    }

    /// Loads an order and tries to attach its owner.
    #[instrument(skip(self, id, deadline), fields(order_id = %id))]
    pub async fn get_order(
        &self,
        id: &OrderId,
        deadline: Deadline,
    ) -> Result<OrderDetails, OrderError> {
        if id.is_blank() {
            return Err(OrderError::InvalidArgument("order id is required".to_string()));
        }
        let order = self.load(id, deadline).await?;

        let user = match deadline.run(self.users.get_user(&order.user_id)).await {
            Ok(Ok(user)) => UserEnrichment::Resolved(user),
            Ok(Err(e)) => {
                warn!(user_id = %order.user_id, error = %e, "User enrichment unavailable");
                UserEnrichment::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!(user_id = %order.user_id, "User enrichment hit the deadline");
                UserEnrichment::Unavailable {
                    reason: "deadline exceeded".to_string(),
                }
            }
        };

        Ok(OrderDetails { order, user })
    }

    /// One page of a user's orders, newest first.
    #[instrument(skip(self, user_id, deadline), fields(user_id = %user_id))]
    pub async fn list_orders(
        &self,
        user_id: &UserId,
        page: i64,
        limit: i64,
        deadline: Deadline,
    ) -> Result<OrderPage, OrderError> {
        if user_id.is_blank() {
            return Err(OrderError::InvalidArgument("user id is required".to_string()));
        }
        let request =
            PageRequest::new(page, limit).map_err(|e| OrderError::InvalidArgument(e.to_string()))?;

        let (orders, total) = deadline
            .run(self.store.list(user_id, request))
            .await
            .map_err(|_| {
                OrderError::Storage("deadline exceeded while listing orders".to_string())
            })??;

        debug!(returned = orders.len(), total, "Listed orders");
        Ok(OrderPage {
            orders,
            total,
            page: request.page(),
            limit: request.limit(),
        })
    }

    /// Moves an order to `status` when the lifecycle allows it.
    #[instrument(skip(self, id, deadline), fields(order_id = %id))]
    pub async fn update_order_status(
        &self,
        id: &OrderId,
        status: &str,
        deadline: Deadline,
    ) -> Result<Order, OrderError> {
        if id.is_blank() {
            return Err(OrderError::InvalidArgument("order id is required".to_string()));
        }
        let next: OrderStatus = status
            .parse()
            .map_err(|e: UnknownStatus| OrderError::InvalidArgument(e.to_string()))?;

        let mut current = self.load(id, deadline).await?.status;
        // Every lost race means the status moved forward, and the lifecycle
        // has no cycles, so this ends after a few rounds at most.
        loop {
            if !current.can_transition_to(next) {
                warn!(from = %current, to = %next, "Rejected status transition");
                return Err(OrderError::InvalidTransition {
                    id: id.clone(),
                    from: current,
                    to: next,
                });
            }

            let written = deadline
                .run(self.store.update_status(id, current, next))
                .await
                .map_err(|_| {
                    OrderError::Storage("deadline exceeded while updating order".to_string())
                })?;

            match written {
                Ok(updated) => {
                    info!(from = %current, to = %updated.status, "Order status updated");
                    return Ok(updated);
                }
                Err(StoreError::StatusChanged { actual, .. }) => {
                    debug!(expected = %current, %actual, "Status changed concurrently");
                    current = actual;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn load(&self, id: &OrderId, deadline: Deadline) -> Result<Order, OrderError> {
        deadline
            .run(self.store.get_by_id(id))
            .await
            .map_err(|_| {
                OrderError::Storage("deadline exceeded while loading order".to_string())
            })?
            .map_err(OrderError::from)
    }
}

fn check_create(user_id: &UserId, items: &[ItemRequest]) -> Result<(), OrderError> {
    if user_id.is_blank() {
        return Err(OrderError::InvalidArgument("user id is required".to_string()));
    }
    if items.is_empty() {
        return Err(OrderError::InvalidArgument(
            "an order needs at least one item".to_string(),
        ));
    }
    for item in items {
        if item.product_id.is_blank() {
            return Err(OrderError::InvalidArgument("product id is required".to_string()));
        }
        if item.quantity == 0 {
            return Err(OrderError::InvalidArgument(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
    }
    Ok(())
}
