use axum::{
    http::Method,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{auth_middleware, AuthState};
use crate::config::Config;
use crate::handlers::{
    cart, health_check, metrics_handler, products, request_validation_middleware,
    route_not_found, security_headers_middleware, timeout_middleware, ApiState,
};
use crate::observability::{observability_middleware, Metrics};

/// Router-level settings taken from [`Config`]
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub base_path: String,
    pub request_timeout: Duration,
    pub max_request_size: usize,
    pub metrics_enabled: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            base_path: "/api/v1".to_string(),
            request_timeout: Duration::from_secs(30),
            max_request_size: 1024 * 1024,
            metrics_enabled: true,
        }
    }
}

impl AppOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_path: config.api.base_path.clone(),
            request_timeout: config.server.request_timeout(),
            max_request_size: config.server.max_request_size,
            metrics_enabled: config.observability.metrics_enabled,
        }
    }
}

/// A set of routes mounted under one prefix of the API base path
pub struct RouteGroup {
    pub name: &'static str,
    pub prefix: &'static str,
    pub routes: fn() -> Router<ApiState>,
}

/// Every authenticated route group, in mount order
pub fn route_groups() -> [RouteGroup; 2] {
    [
        RouteGroup {
            name: "products",
            prefix: "/products",
            routes: product_routes,
        },
        RouteGroup {
            name: "cart",
            prefix: "/cart",
            routes: cart_routes,
        },
    ]
}

pub fn product_routes() -> Router<ApiState> {
    Router::new()
        .route("/create", post(products::create_product))
        .route("/all", get(products::list_products))
        .route("/view/:productId", get(products::get_product))
        .route("/view/by/brand/:brand", get(products::list_by_brand))
        .route("/view/by/category/:category", get(products::list_by_category))
        .route("/:productId/edit", put(products::edit_product))
        .route("/:productId/delete", post(products::delete_product))
}

pub fn cart_routes() -> Router<ApiState> {
    Router::new()
        .route("/:userId/add", post(cart::add_item))
        .route("/:userId/viewcart", get(cart::view_cart))
        .route("/:userId/:productId/edit", put(cart::edit_item))
        .route("/:userId/:productId/delete", post(cart::remove_item))
}

/// Build the application router.
///
/// Route groups sit behind the auth gate; health and metrics stay open.
pub fn create_app(
    state: ApiState,
    auth: AuthState,
    metrics: Arc<Metrics>,
    options: &AppOptions,
) -> Router {
    let mut api = Router::new();
    for group in route_groups() {
        info!(
            group = group.name,
            path = %format!("{}{}", options.base_path, group.prefix),
            "Mounting route group"
        );
        api = api.nest(
            group.prefix,
            (group.routes)().route_layer(middleware::from_fn_with_state(
                auth.clone(),
                auth_middleware,
            )),
        );
    }

    let mut app = Router::new().route("/health/status", get(health_check));
    if options.metrics_enabled {
        app = app.route("/metrics", get(metrics_handler).with_state(metrics.clone()));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86400));

    // Layers listed inner to outer
    app.nest(&options.base_path, api.with_state(state))
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            options.request_timeout,
            timeout_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            options.max_request_size,
            request_validation_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics.clone(), req, next)
        }))
}
