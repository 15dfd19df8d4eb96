pub mod cart;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod products;
pub mod response;

pub use health::*;
pub use metrics::*;
pub use middleware::*;
pub use response::{error_response, route_not_found, ApiResponse, ApiResult, JsonBody};

use std::sync::Arc;

use crate::observability::BusinessTracingMiddleware;
use crate::services::{CartService, ProductService};

/// Shared application state containing all services
#[derive(Clone)]
pub struct ApiState {
    pub product_service: Arc<ProductService>,
    pub cart_service: Arc<CartService>,
    pub business_tracing: BusinessTracingMiddleware,
}
