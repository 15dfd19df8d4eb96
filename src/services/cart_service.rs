use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use super::product_service::validate_id;
use crate::models::{
    AddCartItemRequest, CartItem, DeleteSummary, Patch, ServiceError, ServiceResult,
    UpdateSummary,
};
use crate::repositories::CartRepository;

/// Service for managing per-user carts
pub struct CartService {
    repository: Arc<dyn CartRepository>,
    refresh_last_modified_on_edit: bool,
}

impl CartService {
    pub fn new(repository: Arc<dyn CartRepository>) -> Self {
        Self {
            repository,
            refresh_last_modified_on_edit: false,
        }
    }

    /// When enabled, non-empty edits stamp `lastModified` unless the caller set it
    pub fn with_last_modified_refresh(mut self, enabled: bool) -> Self {
        self.refresh_last_modified_on_edit = enabled;
        self
    }

    /// Always inserts a new line, even when the user already has this product
    #[instrument(skip(self, request), fields(user_id = %user_id, product_id = %request.product_id, quantity = request.quantity))]
    pub async fn add_item(
        &self,
        user_id: &str,
        request: AddCartItemRequest,
    ) -> ServiceResult<CartItem> {
        validate_id("User ID", user_id)?;

        let item = CartItem::new(user_id.to_string(), request);
        self.repository.insert(&item).await?;

        crate::info_with_trace!("Item added to cart");
        Ok(item)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn view_cart(&self, user_id: &str) -> ServiceResult<Vec<CartItem>> {
        validate_id("User ID", user_id)?;

        let items = self.repository.find_by_user(user_id).await?;
        if items.is_empty() {
            crate::info_with_trace!("Cart is empty");
            return Err(ServiceError::CartNotFound {
                user_id: user_id.to_string(),
            });
        }

        crate::info_with_trace!("Cart retrieved with {} items", items.len());
        Ok(items)
    }

    #[instrument(skip(self, patch), fields(user_id = %user_id, product_id = %product_id, fields = patch.len()))]
    pub async fn edit_item(
        &self,
        user_id: &str,
        product_id: &str,
        mut patch: Patch,
    ) -> ServiceResult<UpdateSummary> {
        validate_id("User ID", user_id)?;
        validate_id("Product ID", product_id)?;

        if self.refresh_last_modified_on_edit && !patch.is_empty() {
            patch.insert_if_absent(
                "lastModified",
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }

        let summary = self.repository.update(user_id, product_id, &patch).await?;
        if !summary.matched() {
            crate::info_with_trace!("No cart item matched edit");
            return Err(ServiceError::CartItemNotFound {
                user_id: user_id.to_string(),
                product_id: product_id.to_string(),
            });
        }

        crate::info_with_trace!(
            matched = summary.matched_count,
            modified = summary.modified_count,
            "Cart item edited"
        );
        Ok(summary)
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> ServiceResult<DeleteSummary> {
        validate_id("User ID", user_id)?;
        validate_id("Product ID", product_id)?;

        let summary = self.repository.delete(user_id, product_id).await?;
        if !summary.deleted() {
            crate::info_with_trace!("No cart item matched delete");
            return Err(ServiceError::CartItemNotFound {
                user_id: user_id.to_string(),
                product_id: product_id.to_string(),
            });
        }

        crate::info_with_trace!(deleted = summary.deleted_count, "Cart item removed");
        Ok(summary)
    }
}
