//! # Request Server
//!
//! This module defines the `RpcServer`, the receiving half of a service. It owns
//! the receiver end of the request channel and dispatches every inbound
//! [`Envelope`] to a [`Handler`].
//!
//! Unlike a single-owner state loop, requests are independent of each other:
//! each one is handled on its own Tokio task, so a slow storage write for one
//! caller never holds up another. Shared state lives behind the handler (a
//! connection pool, a lock-guarded table) and must be safe for concurrent use.

use crate::client::RpcClient;
use crate::message::Envelope;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Server-side logic for one request type.
///
/// The handler answers through the responder embedded in `request`. It runs
/// under the request's deadline: when the deadline passes first, the future is
/// dropped along with the responder and any outbound call it was awaiting.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Request: Send + 'static;

    async fn handle(&self, request: Self::Request, deadline: crate::Deadline);
}

/// Dispatch loop for a [`Handler`].
///
/// # Usage Pattern
///
/// 1.  **Create**: `RpcServer::new(handler, buffer)` returns the server and a cloneable client.
/// 2.  **Run**: spawn `server.run()`.
/// 3.  **Stop**: drop every client. The loop stops accepting, waits for in-flight
///     requests to finish, then returns.
///
/// ```rust
/// use async_trait::async_trait;
/// use order_framework::{Deadline, Handler, Response, RpcServer};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Handler for Echo {
///     type Request = (String, Response<String>);
///
///     async fn handle(&self, request: Self::Request, _deadline: Deadline) {
///         let (text, respond_to) = request;
///         let _ = respond_to.send(Ok(text));
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let (server, client) = RpcServer::new(Echo, 8);
///     let handle = tokio::spawn(server.run());
///
///     let reply = client
///         .call(Deadline::none(), |respond_to| ("hi".to_string(), respond_to))
///         .await;
///     assert_eq!(reply.unwrap(), "hi");
///
///     drop(client);
///     handle.await.unwrap();
/// }
/// ```
pub struct RpcServer<H: Handler> {
    receiver: mpsc::Receiver<Envelope<H::Request>>,
    handler: Arc<H>,
}

impl<H: Handler> RpcServer<H> {
    /// Creates the server and the client connected to it.
    ///
    /// `buffer_size` bounds the request channel; callers wait for space when it
    /// is full.
    pub fn new(handler: H, buffer_size: usize) -> (Self, RpcClient<H::Request>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let server = Self {
            receiver,
            handler: Arc::new(handler),
        };
        (server, RpcClient::new(sender))
    }

    /// Runs until every client is dropped and all in-flight requests finished.
    pub async fn run(mut self) {
        // Extract just the type name (e.g., "OrderHandler")
        let service = std::any::type_name::<H>()
            .rsplit("::")
            .next()
            .unwrap_or("Unknown");
        info!(service, "Server started");

        let mut in_flight = JoinSet::new();
        let mut handled: u64 = 0;

        loop {
            tokio::select! {
                msg = self.receiver.recv() => {
                    let Some(Envelope { deadline, request }) = msg else {
                        break;
                    };
                    handled += 1;
                    if deadline.is_elapsed() {
                        warn!(service, "Deadline elapsed before dispatch");
                        continue;
                    }
                    let handler = Arc::clone(&self.handler);
                    in_flight.spawn(async move {
                        if deadline.run(handler.handle(request, deadline)).await.is_err() {
                            warn!(service, "Deadline elapsed during handling");
                        }
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(service, error = %e, "Request task failed");
                    }
                }
            }
        }

        debug!(service, pending = in_flight.len(), "Draining in-flight requests");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(service, error = %e, "Request task failed");
            }
        }

        info!(service, handled, "Shutdown");
    }
}
