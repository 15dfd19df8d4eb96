use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use storefront_rs::{
    auth::{AuthState, StaticTokenAuthenticator},
    create_app,
    handlers::ApiState,
    init_observability,
    models::{registered_collections, CollectionSchema, CART_ITEMS},
    observability::{BusinessTracingMiddleware, DatabaseTracingMiddleware, Metrics},
    repositories::{DynamoDbCartRepository, DynamoDbProductRepository, TableManager},
    services::{CartService, ProductService},
    shutdown_observability, AppOptions, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment()
        .await
        .context("Failed to load configuration")?;
    println!("Configuration loaded successfully");

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref(),
        config.observability.enable_json_logging,
        &config.observability.log_level,
    )?;

    info!("Starting storefront-rs service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!(
        "DynamoDB Tables: products={}, cart_items={}",
        config.database.products_table_name, config.database.cart_items_table_name
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());

    // Collections are bootstrapped once, before any route is wired
    if config.database.bootstrap_tables {
        let table_manager = TableManager::new(dynamodb_client.clone());
        let collections: Vec<(&CollectionSchema, String)> = registered_collections()
            .into_iter()
            .map(|schema| (schema, table_name_for(&config, schema)))
            .collect();
        table_manager.bootstrap(&collections).await;
    } else {
        warn!("Table bootstrap disabled, assuming tables exist");
    }

    let db_tracing = DatabaseTracingMiddleware::new(metrics.clone());
    let product_repository = Arc::new(
        DynamoDbProductRepository::new(
            dynamodb_client.clone(),
            config.database.products_table_name.clone(),
            config.database.region.clone(),
        )
        .with_tracing(db_tracing.clone()),
    );
    let cart_repository = Arc::new(
        DynamoDbCartRepository::new(
            dynamodb_client,
            config.database.cart_items_table_name.clone(),
            config.database.region.clone(),
        )
        .with_tracing(db_tracing),
    );
    info!("Repositories initialized successfully");

    let state = ApiState {
        product_service: Arc::new(ProductService::new(product_repository)),
        cart_service: Arc::new(
            CartService::new(cart_repository)
                .with_last_modified_refresh(config.cart.refresh_last_modified_on_edit),
        ),
        business_tracing: BusinessTracingMiddleware::new(metrics.clone()),
    };
    info!(
        refresh_last_modified_on_edit = config.cart.refresh_last_modified_on_edit,
        "Services initialized successfully"
    );

    let auth = AuthState::new(Arc::new(StaticTokenAuthenticator::new(
        config.auth.token.clone(),
    )))
    .with_metrics(metrics.clone());

    let app = create_app(state, auth, metrics, &AppOptions::from_config(&config));

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn table_name_for(config: &Config, schema: &CollectionSchema) -> String {
    if schema.name == CART_ITEMS.name {
        config.database.cart_items_table_name.clone()
    } else {
        config.database.products_table_name.clone()
    }
}
