use crate::clients::{
    CatalogError, DirectoryError, FixtureCatalog, FixtureDirectory, HttpProductCatalog,
    HttpUserDirectory, ProductCatalog, UserDirectory,
};
use crate::config::{Config, StoreBackend};
use crate::service::OrderService;
use crate::store::{InMemoryOrderStore, OrderStore, PgOrderStore, StoreError};
use crate::transport::{self, OrderClient};
use std::sync::Arc;
use tracing::{error, info};

/// Conditions that stop the process before it serves anything.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage unavailable at startup: {0}")]
    Store(#[from] StoreError),
    #[error("product client setup failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("user client setup failed: {0}")]
    Directory(#[from] DirectoryError),
}

/// The running order service.
///
/// `OrderSystem` is responsible for:
/// - **Wiring**: building the store and the remote clients from [`Config`]
/// - **Lifecycle**: starting the request server and stopping it gracefully
///
/// # Example
///
/// ```ignore
/// let system = OrderSystem::from_config(&Config::from_env()?).await?;
///
/// let order = system.order_client.create_order(request).await?;
///
/// // Gracefully shut down when done
/// system.shutdown().await?;
/// ```
pub struct OrderSystem {
    /// Client for the order service
    pub order_client: OrderClient,

    /// Task handle of the request server (used for graceful shutdown)
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl OrderSystem {
    /// Starts the request server around an already wired service.
    pub fn start(service: OrderService) -> Self {
        let (server, order_client) = transport::new(service);
        let handle = tokio::spawn(server.run());
        Self {
            order_client,
            handles: vec![handle],
        }
    }

    /// Builds every dependency from configuration and starts the server.
    ///
    /// The initial storage connection is bounded by the configured connect
    /// timeout; failing it is fatal.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let service = build_service(config).await?;
        let mut system = Self::start(service);
        system.order_client = system.order_client.with_timeout(config.request_timeout);
        Ok(system)
    }

    /// Gracefully shuts down the system.
    ///
    /// Dropping the client closes the request channel. The server stops
    /// accepting, finishes the requests already in flight, then exits.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the server shut down cleanly
    /// - `Err(String)` if the server task failed or panicked
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");

        drop(self.order_client);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Server task failed: {:?}", e);
                return Err(format!("Server task failed: {:?}", e));
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}

/// Wires the store and the remote clients selected by `config`.
pub async fn build_service(config: &Config) -> Result<OrderService, StartupError> {
    let store: Arc<dyn OrderStore> = match config.store {
        StoreBackend::Memory => {
            info!("Using in-memory order store");
            Arc::new(InMemoryOrderStore::new())
        }
        StoreBackend::Postgres => {
            let store = PgOrderStore::connect(&config.database).await?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
    };

    let catalog: Arc<dyn ProductCatalog> = match &config.remote.product_service_url {
        Some(url) => {
            info!(%url, "Using remote product service");
            Arc::new(HttpProductCatalog::new(url.clone(), config.remote.timeout)?)
        }
        None => {
            info!("No product service configured, using fixture catalog");
            Arc::new(FixtureCatalog::demo())
        }
    };

    let users: Arc<dyn UserDirectory> = match &config.remote.user_service_url {
        Some(url) => {
            info!(%url, "Using remote user service");
            Arc::new(HttpUserDirectory::new(url.clone(), config.remote.timeout)?)
        }
        None => {
            info!("No user service configured, using fixture directory");
            Arc::new(FixtureDirectory::demo())
        }
    };

    Ok(OrderService::new(store, catalog, users))
}
