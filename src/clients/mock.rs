//! Scripted doubles for the remote clients, built on
//! [`order_framework::mock::Expectations`].
//!
//! ```rust
//! use order_authority::clients::{MockProductCatalog, ProductCatalog};
//! use order_authority::model::{ItemRequest, ValidationResult};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let catalog = MockProductCatalog::new();
//! catalog
//!     .expect_validate()
//!     .return_ok(ValidationResult { valid: false, products: vec![] });
//!
//! let result = catalog.validate_items(&[ItemRequest::new("p1", 1)]).await.unwrap();
//! assert!(!result.valid);
//! catalog.verify();
//! # }
//! ```

use super::{CatalogError, DirectoryError, ProductCatalog, UserDirectory};
use crate::model::{ItemRequest, User, UserId, ValidationResult};
use async_trait::async_trait;
use order_framework::mock::{ExpectationBuilder, Expectations};
use std::time::Duration;

type ValidateCall = Expectations<Vec<ItemRequest>, Result<ValidationResult, CatalogError>>;
type GetUserCall = Expectations<UserId, Result<User, DirectoryError>>;

/// Mock product authority.
#[derive(Clone, Default)]
pub struct MockProductCatalog {
    expectations: ValidateCall,
    delay: Option<Duration>,
}

impl MockProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call waits `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Expects a `validate_items` call.
    pub fn expect_validate(
        &self,
    ) -> ExpectationBuilder<Vec<ItemRequest>, Result<ValidationResult, CatalogError>> {
        self.expectations.expect("validate_items")
    }

    /// Item sets received so far.
    pub fn calls(&self) -> Vec<Vec<ItemRequest>> {
        self.expectations.calls()
    }

    pub fn verify(&self) {
        self.expectations.verify();
    }
}

#[async_trait]
impl ProductCatalog for MockProductCatalog {
    async fn validate_items(
        &self,
        items: &[ItemRequest],
    ) -> Result<ValidationResult, CatalogError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.expectations.next("validate_items", items.to_vec())
    }
}

/// Mock identity authority.
#[derive(Clone, Default)]
pub struct MockUserDirectory {
    expectations: GetUserCall,
    delay: Option<Duration>,
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Expects a `get_user` call for `id`.
    pub fn expect_get_user(
        &self,
        id: impl Into<UserId>,
    ) -> ExpectationBuilder<UserId, Result<User, DirectoryError>> {
        let id = id.into();
        self.expectations
            .expect("get_user")
            .matching(move |requested| requested == &id)
    }

    pub fn call_count(&self) -> usize {
        self.expectations.call_count()
    }

    pub fn verify(&self) {
        self.expectations.verify();
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn get_user(&self, id: &UserId) -> Result<User, DirectoryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.expectations.next("get_user", id.clone())
    }
}
