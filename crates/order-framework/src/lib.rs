//! # Order Framework
//!
//! Request/response plumbing shared by the order service and its tests.
//!
//! A service is a [`Handler`] behind an [`RpcServer`]. Callers hold an
//! [`RpcClient`] and send requests that carry their own reply channel
//! ([`Response`]) and a [`Deadline`]. Every outcome is either a value or a
//! [`Status`] with a fixed [`Code`].
//!
//! ## Concurrency Model
//!
//! - Each inbound request runs on its own Tokio task.
//! - The deadline bounds the handler; expiry drops the handler future.
//! - Dropping every client shuts the server down after in-flight requests finish.
//!
//! ## Testing
//!
//! See [`mock`] for scripted collaborator doubles and channel-level client mocks.

pub mod client;
pub mod deadline;
pub mod error;
pub mod message;
pub mod mock;
pub mod server;
pub mod tracing;

pub use client::RpcClient;
pub use deadline::{Deadline, Elapsed};
pub use error::{Code, Status};
pub use message::{Envelope, Response};
pub use server::{Handler, RpcServer};
