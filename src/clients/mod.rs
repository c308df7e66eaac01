//! # Remote Clients
//!
//! Capability-typed stubs for the two services this one depends on:
//!
//! - [`ProductCatalog`]: the product authority. Validates requested items and
//!   reports their current price and name. Prices from here are the only
//!   prices an order is ever built from.
//! - [`UserDirectory`]: the identity authority. Used only to enrich reads, so
//!   callers must treat every failure as tolerable.
//!
//! Each capability has three implementations: HTTP (production), fixture
//! (deterministic in-process data for the demo and end-to-end tests) and mock
//! (scripted expectations for unit tests).

use crate::model::{ItemRequest, User, UserId, ValidationResult};
use async_trait::async_trait;

pub mod fixture;
pub mod http;
pub mod mock;

pub use fixture::{FixtureCatalog, FixtureDirectory};
pub use http::{HttpProductCatalog, HttpUserDirectory};
pub use mock::{MockProductCatalog, MockUserDirectory};

/// Errors from the product authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The call did not complete: connection refused, timeout, deadline.
    #[error("Product service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-success status.
    #[error("Product service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Invalid response from product service: {0}")]
    Decode(String),
}

/// Errors from the identity authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The user does not exist.
    #[error("User not found: {0}")]
    NotFound(UserId),

    /// The call did not complete: connection refused, timeout, deadline.
    #[error("User service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-success status.
    #[error("User service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Invalid response from user service: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Checks the requested `(product, quantity)` pairs.
    async fn validate_items(
        &self,
        items: &[ItemRequest],
    ) -> Result<ValidationResult, CatalogError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: &UserId) -> Result<User, DirectoryError>;
}
