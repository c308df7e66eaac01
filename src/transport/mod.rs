//! # Transport Adapter
//!
//! The service boundary. Callers hold an [`OrderClient`]; requests travel as
//! [`OrderRequest`] messages to an [`RpcServer`] that runs each one on its own
//! task through the [`OrderHandler`]. Orchestrator errors leave this layer as
//! [`Status`](order_framework::Status) values (see [`to_status`]).

use crate::service::OrderService;
use order_framework::RpcServer;

pub mod client;
pub mod handler;
pub mod messages;

pub use client::OrderClient;
pub use handler::{to_status, OrderHandler};
pub use messages::{
    CreateOrderRequest, GetOrderRequest, ListOrdersRequest, OrderItemInput, OrderRequest,
    UpdateOrderStatusRequest,
};

/// Request channel capacity.
const BUFFER_SIZE: usize = 64;

/// Creates the order server and its client.
///
/// The server does nothing until `run()` is spawned.
pub fn new(service: OrderService) -> (RpcServer<OrderHandler>, OrderClient) {
    let (server, client) = RpcServer::new(OrderHandler::new(service), BUFFER_SIZE);
    (server, OrderClient::new(client))
}
