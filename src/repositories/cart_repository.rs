use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::document::{
    dynamodb_span, from_item, item_to_model, map_sdk_error, model_to_item, Item,
    UpdateExpression,
};
use crate::models::{
    CartItem, DeleteSummary, Patch, RepositoryError, RepositoryResult, UpdateSummary,
    CART_ITEMS, CART_ITEM_ID,
};
use crate::observability::DatabaseTracingMiddleware;

/// Data access for the `cart_items` collection
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Store a new line; existing lines for the same product are left alone
    async fn insert(&self, item: &CartItem) -> RepositoryResult<()>;

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<CartItem>>;

    /// Merge `patch` into every line of `user_id` that references `product_id`
    async fn update(
        &self,
        user_id: &str,
        product_id: &str,
        patch: &Patch,
    ) -> RepositoryResult<UpdateSummary>;

    /// Remove every line of `user_id` that references `product_id`
    async fn delete(&self, user_id: &str, product_id: &str) -> RepositoryResult<DeleteSummary>;
}

/// DynamoDB implementation of the CartRepository trait
pub struct DynamoDbCartRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
    db_tracing: Option<DatabaseTracingMiddleware>,
}

impl DynamoDbCartRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
            db_tracing: None,
        }
    }

    pub fn with_tracing(mut self, db_tracing: DatabaseTracingMiddleware) -> Self {
        self.db_tracing = Some(db_tracing);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert a cart item into a stored item, including its internal sort key
    pub fn cart_item_to_item(&self, cart_item: &CartItem) -> RepositoryResult<Item> {
        let mut item = model_to_item(cart_item)?;
        item.insert(
            CART_ITEM_ID.to_string(),
            AttributeValue::S(cart_item.cart_item_id.clone()),
        );
        Ok(item)
    }

    pub fn item_to_cart_item(&self, mut item: Item) -> RepositoryResult<CartItem> {
        let cart_item_id = match item.remove(CART_ITEM_ID) {
            Some(AttributeValue::S(id)) => id,
            _ => {
                return Err(RepositoryError::InvalidDocument {
                    message: format!("Missing {}", CART_ITEM_ID),
                })
            }
        };
        let mut cart_item: CartItem = item_to_model(&item)?;
        cart_item.cart_item_id = cart_item_id;
        Ok(cart_item)
    }

    /// Primary key of a stored line, taken from the item itself
    fn key_of(&self, item: &Item) -> Option<Item> {
        CART_ITEMS
            .key_attributes()
            .into_iter()
            .map(|name| item.get(name).map(|value| (name.to_string(), value.clone())))
            .collect()
    }

    async fn observe<T, F>(&self, operation: &str, future: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        let span = dynamodb_span(&self.table_name, &self.region, operation);
        match &self.db_tracing {
            Some(db_tracing) => {
                db_tracing
                    .trace_operation(operation, &self.table_name, future)
                    .instrument(span)
                    .await
            }
            None => future.instrument(span).await,
        }
    }

    /// Every stored line of `user_id`, optionally restricted to one product
    async fn query_items(
        &self,
        user_id: &str,
        product_id: Option<&str>,
    ) -> RepositoryResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#uid = :uid")
                .expression_attribute_names("#uid", CART_ITEMS.partition_key)
                .expression_attribute_values(":uid", AttributeValue::S(user_id.to_string()))
                .set_exclusive_start_key(start_key.take());

            if let Some(product_id) = product_id {
                request = request
                    .filter_expression("#pid = :pid")
                    .expression_attribute_names("#pid", "productId")
                    .expression_attribute_values(":pid", AttributeValue::S(product_id.to_string()));
            }

            let output = self
                .observe("Query", async {
                    request
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(&self.table_name, e))
                })
                .await?;

            items.extend(output.items.unwrap_or_default());

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl CartRepository for DynamoDbCartRepository {
    #[instrument(skip(self, cart_item), fields(table = %self.table_name, user_id = %cart_item.user_id, product_id = %cart_item.product_id))]
    async fn insert(&self, cart_item: &CartItem) -> RepositoryResult<()> {
        let item = self.cart_item_to_item(cart_item)?;

        self.observe("PutItem", async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| map_sdk_error(&self.table_name, e))
        })
        .await?;

        info!("Cart item stored");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id))]
    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<CartItem>> {
        let items = self.query_items(user_id, None).await?;

        let mut cart_items = Vec::with_capacity(items.len());
        for item in items {
            match self.item_to_cart_item(item) {
                Ok(cart_item) => cart_items.push(cart_item),
                Err(e) => warn!("Skipping unreadable cart document: {}", e),
            }
        }

        info!("Found {} cart items", cart_items.len());
        Ok(cart_items)
    }

    #[instrument(skip(self, patch), fields(table = %self.table_name, user_id = %user_id, product_id = %product_id))]
    async fn update(
        &self,
        user_id: &str,
        product_id: &str,
        patch: &Patch,
    ) -> RepositoryResult<UpdateSummary> {
        let items = self.query_items(user_id, Some(product_id)).await?;
        let mut summary = UpdateSummary::new(items.len() as u64, 0);

        for item in items {
            let current = from_item(&item)?;
            if !patch.would_modify(&current) {
                continue;
            }
            let Some(key) = self.key_of(&item) else {
                warn!("Cart document without a full key, skipping");
                summary.matched_count -= 1;
                continue;
            };

            let UpdateExpression {
                expression,
                mut names,
                values,
            } = UpdateExpression::from_patch(patch);
            names.insert("#uid".to_string(), CART_ITEMS.partition_key.to_string());

            let result = self
                .observe("UpdateItem", async {
                    self.client
                        .update_item()
                        .table_name(&self.table_name)
                        .set_key(Some(key))
                        .update_expression(expression)
                        .condition_expression("attribute_exists(#uid)")
                        .set_expression_attribute_names(Some(names))
                        .set_expression_attribute_values(Some(values))
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(&self.table_name, e))
                })
                .await;

            match result {
                Ok(_) => summary.modified_count += 1,
                // Removed between the query and the write
                Err(RepositoryError::ConditionFailed) => summary.matched_count -= 1,
                Err(e) => return Err(e),
            }
        }

        info!(
            matched = summary.matched_count,
            modified = summary.modified_count,
            "Cart items updated"
        );
        Ok(summary)
    }

    #[instrument(skip(self), fields(table = %self.table_name, user_id = %user_id, product_id = %product_id))]
    async fn delete(&self, user_id: &str, product_id: &str) -> RepositoryResult<DeleteSummary> {
        let items = self.query_items(user_id, Some(product_id)).await?;
        let mut summary = DeleteSummary::default();

        for item in items {
            let Some(key) = self.key_of(&item) else {
                warn!("Cart document without a full key, skipping");
                continue;
            };

            let output = self
                .observe("DeleteItem", async {
                    self.client
                        .delete_item()
                        .table_name(&self.table_name)
                        .set_key(Some(key))
                        .return_values(ReturnValue::AllOld)
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(&self.table_name, e))
                })
                .await?;

            if output.attributes.is_some_and(|attributes| !attributes.is_empty()) {
                summary.deleted_count += 1;
            }
        }

        info!(deleted = summary.deleted_count, "Cart items removed");
        Ok(summary)
    }
}
