//! # Order Client
//!
//! Caller side of the order service boundary. Hides the message passing
//! behind one async method per operation.

use super::messages::{
    CreateOrderRequest, GetOrderRequest, ListOrdersRequest, OrderRequest, UpdateOrderStatusRequest,
};
use crate::model::{Order, OrderPage};
use crate::service::OrderDetails;
use order_framework::{Deadline, RpcClient, Status};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for the order service.
#[derive(Clone)]
pub struct OrderClient {
    inner: RpcClient<OrderRequest>,
    timeout: Option<Duration>,
}

impl OrderClient {
    pub fn new(inner: RpcClient<OrderRequest>) -> Self {
        Self {
            inner,
            timeout: None,
        }
    }

    /// Every call made through this client gives up after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn deadline(&self) -> Deadline {
        self.timeout.map(Deadline::after).unwrap_or_default()
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, Status> {
        debug!(?request, "create_order called");
        self.inner
            .call(self.deadline(), |respond_to| OrderRequest::CreateOrder {
                request,
                respond_to,
            })
            .await
    }

    #[instrument(skip(self, id))]
    pub async fn get_order(&self, id: impl Into<String>) -> Result<OrderDetails, Status> {
        let request = GetOrderRequest { id: id.into() };
        self.inner
            .call(self.deadline(), |respond_to| OrderRequest::GetOrder {
                request,
                respond_to,
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, request: ListOrdersRequest) -> Result<OrderPage, Status> {
        self.inner
            .call(self.deadline(), |respond_to| OrderRequest::ListOrders {
                request,
                respond_to,
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        request: UpdateOrderStatusRequest,
    ) -> Result<Order, Status> {
        self.inner
            .call(self.deadline(), |respond_to| OrderRequest::UpdateOrderStatus {
                request,
                respond_to,
            })
            .await
    }
}
