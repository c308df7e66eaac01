//! Server side of the order service boundary.

use super::messages::{CreateOrderRequest, OrderRequest};
use crate::model::{ItemRequest, OrderId, UserId};
use crate::service::{OrderError, OrderService};
use async_trait::async_trait;
use order_framework::{Deadline, Handler, Status};
use tracing::{debug, info, warn};

/// Maps an orchestrator error to its transport status.
///
/// | OrderError | Code |
/// |------------|------|
/// | `NotFound` | `NotFound` |
/// | `ValidationFailed` | `FailedPrecondition` |
/// | `InvalidArgument` | `InvalidArgument` |
/// | `InvalidTransition` | `FailedPrecondition` |
/// | `Storage` | `Internal` |
pub fn to_status(error: &OrderError) -> Status {
    let message = error.to_string();
    match error {
        OrderError::NotFound(_) => Status::not_found(message),
        OrderError::ValidationFailed(_) => Status::failed_precondition(message),
        OrderError::InvalidArgument(_) => Status::invalid_argument(message),
        OrderError::InvalidTransition { .. } => Status::failed_precondition(message),
        OrderError::Storage(_) => Status::internal(message),
    }
}

/// Turns [`OrderRequest`]s into [`OrderService`] calls.
pub struct OrderHandler {
    service: OrderService,
}

impl OrderHandler {
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }

    async fn create(
        &self,
        request: CreateOrderRequest,
        deadline: Deadline,
    ) -> Result<crate::model::Order, OrderError> {
        if request.items.iter().any(|item| item.price.is_some()) {
            debug!("Ignoring caller-supplied item prices");
        }
        let items = request
            .items
            .into_iter()
            .map(ItemRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.service
            .create_order(UserId::new(request.user_id), items, deadline)
            .await
    }
}

/// Sends `result` back, logging failures with their mapped code.
fn reply<T>(
    operation: &'static str,
    respond_to: order_framework::Response<T>,
    result: Result<T, OrderError>,
) {
    let result = result.map_err(|e| {
        let status = to_status(&e);
        warn!(operation, code = %status.code(), error = %e, "Request failed");
        status
    });
    if respond_to.send(result).is_err() {
        debug!(operation, "Caller went away before the reply");
    }
}

#[async_trait]
impl Handler for OrderHandler {
    type Request = OrderRequest;

    async fn handle(&self, request: OrderRequest, deadline: Deadline) {
        match request {
            OrderRequest::CreateOrder {
                request,
                respond_to,
            } => {
                debug!(?request, "CreateOrder");
                let result = self.create(request, deadline).await;
                if let Ok(order) = &result {
                    info!(order_id = %order.id, "CreateOrder ok");
                }
                reply("create_order", respond_to, result);
            }
            OrderRequest::GetOrder {
                request,
                respond_to,
            } => {
                debug!(?request, "GetOrder");
                let result = self
                    .service
                    .get_order(&OrderId::new(request.id), deadline)
                    .await;
                reply("get_order", respond_to, result);
            }
            OrderRequest::ListOrders {
                request,
                respond_to,
            } => {
                debug!(?request, "ListOrders");
                let result = self
                    .service
                    .list_orders(
                        &UserId::new(request.user_id),
                        i64::from(request.page),
                        i64::from(request.limit),
                        deadline,
                    )
                    .await;
                reply("list_orders", respond_to, result);
            }
            OrderRequest::UpdateOrderStatus {
                request,
                respond_to,
            } => {
                debug!(?request, "UpdateOrderStatus");
                let result = self
                    .service
                    .update_order_status(&OrderId::new(request.order_id), &request.status, deadline)
                    .await;
                if let Ok(order) = &result {
                    info!(order_id = %order.id, status = %order.status, "UpdateOrderStatus ok");
                }
                reply("update_order_status", respond_to, result);
            }
        }
    }
}
