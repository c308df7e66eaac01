//! HTTP implementations of the remote clients.
//!
//! | Capability | Request |
//! |------------|---------|
//! | validate items | `POST {base}/v1/products/validate` with `{"items": [{"product_id", "quantity"}]}` |
//! | get user | `GET {base}/v1/users/{id}` |
//!
//! Every request is bounded by a connect timeout and a total request timeout.
//! A timeout surfaces as the call's `Unavailable` error.

use super::{CatalogError, DirectoryError, ProductCatalog, UserDirectory};
use crate::model::{ItemRequest, User, UserId, ValidationResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
}

#[derive(Serialize)]
struct ValidateItemsRequest<'a> {
    items: &'a [ItemRequest],
}

/// Client for the product authority.
#[derive(Debug, Clone)]
pub struct HttpProductCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProductCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = build_client(timeout)
            .map_err(|e| CatalogError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    #[instrument(skip(self, items), fields(item_count = items.len()), err)]
    async fn validate_items(
        &self,
        items: &[ItemRequest],
    ) -> Result<ValidationResult, CatalogError> {
        let url = format!("{}/v1/products/validate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ValidateItemsRequest { items })
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Rejected { status, body });
        }

        let result: ValidationResult = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        debug!(valid = result.valid, products = result.products.len(), "Validation response");
        Ok(result)
    }
}

/// Client for the identity authority.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = build_client(timeout).map_err(|e| {
            DirectoryError::Unavailable(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    #[instrument(skip(self), fields(user_id = %id))]
    async fn get_user(&self, id: &UserId) -> Result<User, DirectoryError> {
        let url = format!("{}/v1/users/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(id.clone())),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| DirectoryError::Decode(e.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(DirectoryError::Rejected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProductId, ValidatedProduct};
    use axum::extract::Path;
    use axum::http::StatusCode as HttpStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Utc;
    use serde_json::Value;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn validate(Json(body): Json<Value>) -> Json<ValidationResult> {
        let products = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| ValidatedProduct {
                product_id: ProductId::new(item["product_id"].as_str().unwrap()),
                price: 9.99,
                name: "Widget".to_string(),
            })
            .collect();
        Json(ValidationResult {
            valid: true,
            products,
        })
    }

    async fn user(Path(id): Path<String>) -> Result<Json<User>, HttpStatus> {
        if id != "u1" {
            return Err(HttpStatus::NOT_FOUND);
        }
        Ok(Json(User {
            id: UserId::new(id),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            role: "customer".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }))
    }

    #[tokio::test]
    async fn test_validate_items_posts_requested_pairs() {
        let base = serve(Router::new().route("/v1/products/validate", post(validate))).await;
        let catalog = HttpProductCatalog::new(format!("{base}/"), Duration::from_secs(2)).unwrap();

        let result = catalog
            .validate_items(&[ItemRequest::new("p1", 2)])
            .await
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.products[0].product_id, ProductId::from("p1"));
        assert_eq!(result.products[0].price, 9.99);
    }

    #[tokio::test]
    async fn test_validate_items_reports_server_errors() {
        let app = Router::new().route(
            "/v1/products/validate",
            post(|| async { (HttpStatus::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let catalog = HttpProductCatalog::new(serve(app).await, Duration::from_secs(2)).unwrap();

        let err = catalog
            .validate_items(&[ItemRequest::new("p1", 1)])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::Rejected {
                status: 503,
                body: "maintenance".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_validate_items_times_out() {
        let app = Router::new().route(
            "/v1/products/validate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let catalog =
            HttpProductCatalog::new(serve(app).await, Duration::from_millis(100)).unwrap();

        let err = catalog
            .validate_items(&[ItemRequest::new("p1", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let directory =
            HttpUserDirectory::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        let err = directory.get_user(&UserId::from("u1")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_get_user() {
        let base = serve(Router::new().route("/v1/users/:id", get(user))).await;
        let directory = HttpUserDirectory::new(base, Duration::from_secs(2)).unwrap();

        let found = directory.get_user(&UserId::from("u1")).await.unwrap();
        assert_eq!(found.name, "Alice");

        let missing = directory.get_user(&UserId::from("u2")).await.unwrap_err();
        assert_eq!(missing, DirectoryError::NotFound(UserId::from("u2")));
    }
}
