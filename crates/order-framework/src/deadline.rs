//! # Deadlines
//!
//! A [`Deadline`] is the absolute instant after which the caller no longer wants
//! a result. It travels with every request so that the server, and every
//! outbound call the server makes on the caller's behalf, stops at the same
//! moment the caller gives up.
//!
//! Running a future under a deadline drops it on expiry. Dropping an in-flight
//! HTTP request cancels it and dropping an open database transaction rolls it
//! back, so nothing keeps running after the caller is gone.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Returned by [`Deadline::run`] when the deadline elapsed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline exceeded")]
pub struct Elapsed;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline; futures run to completion.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    pub fn is_elapsed(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Drives `future` until it completes or the deadline passes.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Elapsed> {
        match self.0 {
            Some(at) => tokio::time::timeout_at(at, future)
                .await
                .map_err(|_| Elapsed),
            None => Ok(future.await),
        }
    }
}
