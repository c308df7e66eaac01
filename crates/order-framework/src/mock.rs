//! # Mock Framework & Testing Guide
//!
//! Two kinds of test doubles live here.
//!
//! - [`Expectations`] is a queue of scripted responses for hand-written mock
//!   implementations of a collaborator trait. Each call pops the next
//!   expectation, checks it was for the same operation (and, optionally, that the
//!   arguments match), records the arguments and returns the scripted response.
//! - [`mock_client`] / [`next_request`] hand you the raw request channel behind an
//!   [`RpcClient`], so a test can assert on exactly what a client facade sends.
//!
//! ## When to use Mocks vs Real Collaborators
//!
//! | Feature | Expectations | Real implementation |
//! |---------|--------------|---------------------|
//! | **Speed** | Instant (in-memory) | Network or database round trip |
//! | **Determinism** | 100% Deterministic | Subject to the environment |
//! | **Error Injection** | Easy (`return_err`) | Hard (requires a broken dependency) |
//! | **Use Case** | Testing logic *around* the collaborator | Testing the collaborator itself |
//!
//! ## Example
//!
//! ```rust
//! use order_framework::mock::Expectations;
//!
//! let prices: Expectations<String, Result<u32, String>> = Expectations::new();
//! prices.expect("price_of").matching(|sku| sku == "p1").return_ok(999);
//! prices.expect("price_of").return_err("catalog offline".to_string());
//!
//! assert_eq!(prices.next("price_of", "p1".to_string()), Ok(999));
//! assert!(prices.next("price_of", "p2".to_string()).is_err());
//! assert_eq!(prices.calls(), vec!["p1".to_string(), "p2".to_string()]);
//! prices.verify();
//! ```

use crate::client::RpcClient;
use crate::message::Envelope;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

type Matcher<A> = Box<dyn Fn(&A) -> bool + Send>;

struct Expectation<A, R> {
    operation: &'static str,
    matcher: Option<Matcher<A>>,
    response: R,
}

struct State<A, R> {
    queue: VecDeque<Expectation<A, R>>,
    calls: Vec<A>,
}

/// An ordered script of expected calls and their responses.
///
/// Cloning shares the script, so one clone can live inside the mock while the
/// test keeps another to add expectations and call [`verify`](Self::verify).
pub struct Expectations<A, R> {
    state: Arc<Mutex<State<A, R>>>,
}

impl<A, R> Clone for Expectations<A, R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, R> Default for Expectations<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> Expectations<A, R> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                queue: VecDeque::new(),
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<A, R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts an expectation for `operation`.
    pub fn expect(&self, operation: &'static str) -> ExpectationBuilder<A, R> {
        ExpectationBuilder {
            operation,
            matcher: None,
            state: Arc::clone(&self.state),
        }
    }

    /// Consumes the next expectation and returns its scripted response.
    ///
    /// # Panics
    /// When nothing is expected, when the next expectation is for a different
    /// operation, or when its matcher rejects `args`.
    pub fn next(&self, operation: &'static str, args: A) -> R {
        let mut state = self.lock();
        let Some(expectation) = state.queue.pop_front() else {
            drop(state);
            panic!("Unexpected call to {operation}: no expectations remaining");
        };
        if expectation.operation != operation {
            drop(state);
            panic!(
                "Expectation mismatch: expected {}, got {operation}",
                expectation.operation
            );
        }
        if let Some(matcher) = &expectation.matcher {
            if !matcher(&args) {
                drop(state);
                panic!("Arguments for {operation} did not match expectation");
            }
        }
        state.calls.push(args);
        expectation.response
    }

    /// Arguments of every call so far, in order.
    pub fn calls(&self) -> Vec<A>
    where
        A: Clone,
    {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.lock().queue.len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

/// Builder returned by [`Expectations::expect`].
pub struct ExpectationBuilder<A, R> {
    operation: &'static str,
    matcher: Option<Matcher<A>>,
    state: Arc<Mutex<State<A, R>>>,
}

impl<A, R> ExpectationBuilder<A, R> {
    /// Only accept calls whose arguments satisfy `predicate`.
    pub fn matching(mut self, predicate: impl Fn(&A) -> bool + Send + 'static) -> Self {
        self.matcher = Some(Box::new(predicate));
        self
    }

    /// Sets the response for this expectation.
    pub fn returning(self, response: R) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.queue.push_back(Expectation {
            operation: self.operation,
            matcher: self.matcher,
            response,
        });
    }
}

impl<A, T, E> ExpectationBuilder<A, Result<T, E>> {
    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: T) {
        self.returning(Ok(value));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: E) {
        self.returning(Err(error));
    }
}

// =============================================================================
// CHANNEL-LEVEL HELPERS
// =============================================================================

/// Creates a client whose requests land in the returned receiver instead of a server.
pub fn mock_client<R: Send + 'static>(
    buffer_size: usize,
) -> (RpcClient<R>, mpsc::Receiver<Envelope<R>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (RpcClient::new(sender), receiver)
}

/// Waits for the next request sent through a [`mock_client`].
pub async fn next_request<R>(receiver: &mut mpsc::Receiver<Envelope<R>>) -> Option<Envelope<R>> {
    receiver.recv().await
}
