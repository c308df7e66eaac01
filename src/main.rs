use order_authority::config::Config;
use order_authority::lifecycle::{setup_tracing, OrderSystem};
use order_authority::transport::{
    CreateOrderRequest, ListOrdersRequest, OrderItemInput, UpdateOrderStatusRequest,
};
use tracing::{error, info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = Config::from_env().map_err(|e| e.to_string())?;

    // Setup tracing once for the entire application
    setup_tracing(config.log_format);

    info!(store = ?config.store, "Starting order service");

    let system = OrderSystem::from_config(&config)
        .await
        .map_err(|e| e.to_string())?;

    // The price sent here is ignored; the product authority sets it.
    let create = CreateOrderRequest {
        user_id: "u1".to_string(),
        items: vec![OrderItemInput {
            product_id: "p1".to_string(),
            quantity: 2,
            price: Some(0.01),
        }],
    };

    let span = tracing::info_span!("order_creation");
    let order = async {
        info!("Placing order");
        system
            .order_client
            .create_order(create)
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;

    info!(order_id = %order.id, total = %order.total, "Order created successfully");

    let span = tracing::info_span!("order_lookup");
    async {
        match system.order_client.get_order(order.id.as_str()).await {
            Ok(details) => match details.user() {
                Some(user) => {
                    info!(order_id = %details.order.id, user = %user.name, "Order loaded")
                }
                None => warn!(order_id = %details.order.id, "Order loaded without user details"),
            },
            Err(e) => error!(error = %e, "Order lookup failed"),
        }

        match system
            .order_client
            .list_orders(ListOrdersRequest {
                user_id: "u1".to_string(),
                page: 1,
                limit: 10,
            })
            .await
        {
            Ok(page) => info!(returned = page.orders.len(), total = page.total, "Orders listed"),
            Err(e) => error!(error = %e, "Listing failed"),
        }
    }
    .instrument(span)
    .await;

    let span = tracing::info_span!("order_lifecycle");
    async {
        let confirmed = system
            .order_client
            .update_order_status(UpdateOrderStatusRequest {
                order_id: order.id.to_string(),
                status: "confirmed".to_string(),
            })
            .await;
        match confirmed {
            Ok(order) => info!(order_id = %order.id, status = %order.status, "Order confirmed"),
            Err(e) => error!(error = %e, "Confirmation failed"),
        }

        // confirmed -> pending is not a legal move
        let rejected = system
            .order_client
            .update_order_status(UpdateOrderStatusRequest {
                order_id: order.id.to_string(),
                status: "pending".to_string(),
            })
            .await;
        if let Err(e) = rejected {
            info!(code = %e.code(), error = %e, "Illegal transition rejected as expected");
        }
    }
    .instrument(span)
    .await;

    // Shutdown system gracefully
    system.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}
