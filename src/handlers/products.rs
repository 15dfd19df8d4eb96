use axum::extract::{Path, State};
use tracing::instrument;

use super::response::{error_response, ApiResponse, ApiResult, JsonBody};
use super::ApiState;
use crate::models::{
    CreateProductRequest, DeleteSummary, Patch, Product, ProductFilter, ServiceError,
    UpdateSummary, PRODUCTS,
};

const NOT_FOUND_BY_ID: &str = "No Product Found with given ID";

#[instrument(name = "create_product", skip(state, body))]
pub async fn create_product(
    State(state): State<ApiState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Product> {
    let request = CreateProductRequest::from_body(body).map_err(|e| {
        error_response(
            &ServiceError::from(e),
            NOT_FOUND_BY_ID,
            "Failed to create product",
        )
    })?;

    state
        .business_tracing
        .trace_product_operation("create", None, state.product_service.create_product(request))
        .await
        .map(|product| ApiResponse::success("Product Details created successfully", product))
        .map_err(|e| error_response(&e, NOT_FOUND_BY_ID, "Failed to create product"))
}

#[instrument(name = "list_products", skip(state))]
pub async fn list_products(State(state): State<ApiState>) -> ApiResult<Vec<Product>> {
    state
        .business_tracing
        .trace_product_operation("list", None, state.product_service.list_products())
        .await
        .map(|products| ApiResponse::success("All Products Found", products))
        .map_err(|e| error_response(&e, "No Product Found", "Error Occured"))
}

#[instrument(name = "get_product", skip(state))]
pub async fn get_product(
    State(state): State<ApiState>,
    Path(product_id): Path<String>,
) -> ApiResult<Product> {
    state
        .business_tracing
        .trace_product_operation("get", None, state.product_service.get_product(&product_id))
        .await
        .map(|product| ApiResponse::success("Product found", product))
        .map_err(|e| error_response(&e, NOT_FOUND_BY_ID, "Failed to find product details"))
}

#[instrument(name = "list_products_by_brand", skip(state))]
pub async fn list_by_brand(
    State(state): State<ApiState>,
    Path(brand): Path<String>,
) -> ApiResult<Vec<Product>> {
    let filter = ProductFilter::Brand.attribute();
    state
        .business_tracing
        .trace_product_operation("list", Some(filter), state.product_service.list_by_brand(&brand))
        .await
        .map(|products| ApiResponse::success("Products found", products))
        .map_err(|e| error_response(&e, "No Product Found of given brand", "Error Occured"))
}

#[instrument(name = "list_products_by_category", skip(state))]
pub async fn list_by_category(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> ApiResult<Vec<Product>> {
    let filter = ProductFilter::Category.attribute();
    state
        .business_tracing
        .trace_product_operation(
            "list",
            Some(filter),
            state.product_service.list_by_category(&category),
        )
        .await
        .map(|products| ApiResponse::success("Products found", products))
        .map_err(|e| error_response(&e, "No Product Found in given category", "Error Occured"))
}

#[instrument(name = "edit_product", skip(state, body))]
pub async fn edit_product(
    State(state): State<ApiState>,
    Path(product_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<UpdateSummary> {
    let patch = Patch::from_value(&PRODUCTS, body).map_err(|e| {
        error_response(&ServiceError::from(e), NOT_FOUND_BY_ID, "Failed to edit product")
    })?;

    state
        .business_tracing
        .trace_product_operation(
            "edit",
            None,
            state.product_service.edit_product(&product_id, patch),
        )
        .await
        .map(|summary| ApiResponse::success("Product Details edited successfully", summary))
        .map_err(|e| error_response(&e, NOT_FOUND_BY_ID, "Failed to edit product"))
}

#[instrument(name = "delete_product", skip(state))]
pub async fn delete_product(
    State(state): State<ApiState>,
    Path(product_id): Path<String>,
) -> ApiResult<DeleteSummary> {
    state
        .business_tracing
        .trace_product_operation("delete", None, state.product_service.delete_product(&product_id))
        .await
        .map(|summary| ApiResponse::success("Product Deleted", summary))
        .map_err(|e| error_response(&e, NOT_FOUND_BY_ID, "Error Occured"))
}
