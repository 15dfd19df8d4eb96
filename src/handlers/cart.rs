use axum::extract::{Path, State};
use tracing::instrument;

use super::response::{error_response, ApiResponse, ApiResult, JsonBody};
use super::ApiState;
use crate::models::{
    AddCartItemRequest, CartItem, DeleteSummary, Patch, ServiceError, UpdateSummary, CART_ITEMS,
};

const ITEM_NOT_FOUND: &str = "Product not found";
const FAILURE: &str = "Error Occured";

#[instrument(name = "add_cart_item", skip(state, body))]
pub async fn add_item(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<CartItem> {
    let request = AddCartItemRequest::from_body(body)
        .map_err(|e| error_response(&ServiceError::from(e), ITEM_NOT_FOUND, FAILURE))?;

    state
        .business_tracing
        .trace_cart_operation(
            "add",
            Some(user_id.as_str()),
            state.cart_service.add_item(&user_id, request),
        )
        .await
        .map(|item| ApiResponse::success("Product added to cart successfully", item))
        .map_err(|e| error_response(&e, ITEM_NOT_FOUND, FAILURE))
}

#[instrument(name = "view_cart", skip(state))]
pub async fn view_cart(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<CartItem>> {
    state
        .business_tracing
        .trace_cart_operation(
            "view",
            Some(user_id.as_str()),
            state.cart_service.view_cart(&user_id),
        )
        .await
        .map(|items| ApiResponse::success("Displaying Cart items", items))
        .map_err(|e| error_response(&e, "Cart items not found", FAILURE))
}

#[instrument(name = "edit_cart_item", skip(state, body))]
pub async fn edit_item(
    State(state): State<ApiState>,
    Path((user_id, product_id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> ApiResult<UpdateSummary> {
    let patch = Patch::from_value(&CART_ITEMS, body)
        .map_err(|e| error_response(&ServiceError::from(e), ITEM_NOT_FOUND, FAILURE))?;

    state
        .business_tracing
        .trace_cart_operation(
            "edit",
            Some(user_id.as_str()),
            state.cart_service.edit_item(&user_id, &product_id, patch),
        )
        .await
        .map(|summary| ApiResponse::success("Product Edited Successfully.", summary))
        .map_err(|e| error_response(&e, ITEM_NOT_FOUND, FAILURE))
}

#[instrument(name = "remove_cart_item", skip(state))]
pub async fn remove_item(
    State(state): State<ApiState>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> ApiResult<DeleteSummary> {
    state
        .business_tracing
        .trace_cart_operation(
            "remove",
            Some(user_id.as_str()),
            state.cart_service.remove_item(&user_id, &product_id),
        )
        .await
        .map(|summary| ApiResponse::success("Product Deleted Successfully", summary))
        .map_err(|e| error_response(&e, ITEM_NOT_FOUND, FAILURE))
}
