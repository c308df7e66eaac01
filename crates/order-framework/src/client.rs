//! # Request Client
//!
//! The sending half of a service. It wraps a request in an [`Envelope`] with
//! the caller's deadline and waits for the handler's reply.

use crate::deadline::Deadline;
use crate::error::Status;
use crate::message::{Envelope, Response};
use tokio::sync::{mpsc, oneshot};

/// A cloneable handle to an [`RpcServer`](crate::RpcServer).
///
/// * **Cloneable** – holds only a sender, so cloning is inexpensive.
/// * **Deadline aware** – a call never outlives its [`Deadline`].
pub struct RpcClient<R> {
    sender: mpsc::Sender<Envelope<R>>,
}

impl<R> Clone for RpcClient<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R: Send + 'static> RpcClient<R> {
    pub fn new(sender: mpsc::Sender<Envelope<R>>) -> Self {
        Self { sender }
    }

    /// Sends the request built by `make` and waits for its response.
    ///
    /// Failures are reported as a [`Status`]:
    /// - the server is gone: [`Code::Unavailable`](crate::Code::Unavailable)
    /// - the deadline passed: [`Code::DeadlineExceeded`](crate::Code::DeadlineExceeded)
    /// - the handler dropped the responder without answering:
    ///   [`Code::Internal`](crate::Code::Internal)
    pub async fn call<T, F>(&self, deadline: Deadline, make: F) -> Result<T, Status>
    where
        T: Send,
        F: FnOnce(Response<T>) -> R,
    {
        let (respond_to, response) = oneshot::channel();
        let envelope = Envelope {
            deadline,
            request: make(respond_to),
        };

        let exchange = async {
            self.sender
                .send(envelope)
                .await
                .map_err(|_| Status::unavailable("server closed"))?;
            match response.await {
                Ok(result) => result,
                Err(_) if deadline.is_elapsed() => {
                    Err(Status::deadline_exceeded("deadline exceeded"))
                }
                Err(_) => Err(Status::internal("server dropped response channel")),
            }
        };

        deadline
            .run(exchange)
            .await
            .unwrap_or_else(|_| Err(Status::deadline_exceeded("deadline exceeded")))
    }

    /// True once the server stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
