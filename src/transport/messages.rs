//! Request and response records of the order service boundary, and the
//! message enum that carries them to the handler.

use crate::model::{ItemRequest, Order, OrderPage, ProductId};
use crate::service::{OrderDetails, OrderError};
use order_framework::Response;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: String,
    pub quantity: i32,
    /// Accepted for wire compatibility and ignored: prices come from the
    /// product authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl TryFrom<OrderItemInput> for ItemRequest {
    type Error = OrderError;

    fn try_from(input: OrderItemInput) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(input.quantity).map_err(|_| {
            OrderError::InvalidArgument(format!(
                "quantity for product {} must be positive, got {}",
                input.product_id, input.quantity
            ))
        })?;
        Ok(ItemRequest {
            product_id: ProductId::new(input.product_id),
            quantity,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetOrderRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOrdersRequest {
    pub user_id: String,
    pub page: i32,
    pub limit: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub order_id: String,
    pub status: String,
}

/// Message type sent to the [`OrderHandler`](super::OrderHandler).
///
/// One variant per operation, each with its own typed reply channel, so a
/// `GetOrder` can only ever be answered with [`OrderDetails`].
#[derive(Debug)]
pub enum OrderRequest {
    CreateOrder {
        request: CreateOrderRequest,
        respond_to: Response<Order>,
    },
    GetOrder {
        request: GetOrderRequest,
        respond_to: Response<OrderDetails>,
    },
    ListOrders {
        request: ListOrdersRequest,
        respond_to: Response<OrderPage>,
    },
    UpdateOrderStatus {
        request: UpdateOrderStatusRequest,
        respond_to: Response<Order>,
    },
}
