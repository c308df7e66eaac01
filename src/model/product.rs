//! Records exchanged with the product authority.
//!
//! The product catalog is owned by another service. The only thing this
//! service asks of it is "are these items orderable, and at what price?".

use serde::{Deserialize, Serialize};

string_id!(
    /// Type-safe identifier for Products.
    ProductId
);

/// One requested line: a product and how many units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl ItemRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Current price and display name of a product, as reported by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedProduct {
    pub product_id: ProductId,
    pub price: f64,
    pub name: String,
}

/// Answer to a validation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub products: Vec<ValidatedProduct>,
}

impl ValidationResult {
    pub fn find(&self, product_id: &ProductId) -> Option<&ValidatedProduct> {
        self.products.iter().find(|p| &p.product_id == product_id)
    }
}
