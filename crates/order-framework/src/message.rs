//! # Envelopes
//!
//! Requests travel from [`RpcClient`](crate::RpcClient) to
//! [`RpcServer`](crate::RpcServer) wrapped in an [`Envelope`] carrying the
//! caller's [`Deadline`]. Each request variant owns a [`Response`] the handler
//! answers through exactly once.

use crate::deadline::Deadline;
use crate::error::Status;
use tokio::sync::oneshot;

/// One-shot reply channel embedded in each request variant.
pub type Response<T> = oneshot::Sender<Result<T, Status>>;

#[derive(Debug)]
pub struct Envelope<R> {
    pub deadline: Deadline,
    pub request: R,
}
