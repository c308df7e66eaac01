//! # Order Authority
//!
//! An order service that owns the order lifecycle and defers to two other
//! services for everything else: a product authority for prices and item
//! validity, and an identity authority for user details.
//!
//! ## Layers
//!
//! ### 1. The Boundary ([`transport`])
//! Typed request/response messages served by an
//! [`RpcServer`](order_framework::RpcServer). Callers use
//! [`OrderClient`](transport::OrderClient); failures arrive as
//! [`Status`](order_framework::Status) codes.
//!
//! ### 2. The Orchestrator ([`service`])
//! [`OrderService`](service::OrderService) sequences validation, pricing,
//! persistence and enrichment for each operation.
//!
//! ### 3. The Collaborators ([`clients`], [`store`])
//! - [`ProductCatalog`](clients::ProductCatalog) and
//!   [`UserDirectory`](clients::UserDirectory) talk to the remote authorities.
//! - [`OrderStore`](store::OrderStore) persists orders and their line items
//!   atomically, in memory or in PostgreSQL.
//!
//! ### 4. Wiring ([`config`], [`lifecycle`])
//! [`OrderSystem`](lifecycle::OrderSystem) builds everything from
//! environment configuration and shuts it down gracefully.
//!
//! ## Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```
//!
//! With no service URLs configured the demo runs against in-process fixture
//! authorities and an in-memory store.

pub mod clients;
pub mod config;
pub mod lifecycle;
pub mod model;
pub mod service;
pub mod store;
pub mod transport;
