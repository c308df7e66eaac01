//! Deterministic in-process stand-ins for the remote authorities.
//!
//! Used when no service URL is configured, by the demo binary and by the
//! end-to-end tests.

use super::{CatalogError, DirectoryError, ProductCatalog, UserDirectory};
use crate::model::{ItemRequest, ProductId, User, UserId, ValidatedProduct, ValidationResult};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    price: f64,
    stock: u32,
}

/// A product catalog backed by a fixed table.
///
/// An item set is valid when every product exists and has enough stock for
/// the requested quantity. Known products are reported with their price even
/// when the set as a whole is invalid.
#[derive(Debug, Clone, Default)]
pub struct FixtureCatalog {
    products: HashMap<ProductId, CatalogEntry>,
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(
        mut self,
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: f64,
        stock: u32,
    ) -> Self {
        self.products.insert(
            id.into(),
            CatalogEntry {
                name: name.into(),
                price,
                stock,
            },
        );
        self
    }

    /// The catalog the demo binary runs against.
    pub fn demo() -> Self {
        Self::new()
            .with_product("p1", "Widget", 9.99, 100)
            .with_product("p2", "Gadget", 24.50, 10)
            .with_product("p3", "Gizmo", 120.00, 1)
    }
}

#[async_trait]
impl ProductCatalog for FixtureCatalog {
    async fn validate_items(
        &self,
        items: &[ItemRequest],
    ) -> Result<ValidationResult, CatalogError> {
        let mut valid = true;
        let mut products = Vec::with_capacity(items.len());
        for item in items {
            match self.products.get(&item.product_id) {
                Some(entry) => {
                    valid &= item.quantity <= entry.stock;
                    products.push(ValidatedProduct {
                        product_id: item.product_id.clone(),
                        price: entry.price,
                        name: entry.name.clone(),
                    });
                }
                None => valid = false,
            }
        }
        debug!(valid, item_count = items.len(), "Fixture validation");
        Ok(ValidationResult { valid, products })
    }
}

/// A user directory backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct FixtureDirectory {
    users: HashMap<UserId, User>,
}

impl FixtureDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    /// The directory the demo binary runs against.
    pub fn demo() -> Self {
        let joined = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self::new().with_user(User {
            id: UserId::from("u1"),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            role: "customer".to_string(),
            created_at: joined,
            updated_at: joined,
        })
    }
}

#[async_trait]
impl UserDirectory for FixtureDirectory {
    async fn get_user(&self, id: &UserId) -> Result<User, DirectoryError> {
        self.users
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(id.clone()))
    }
}
