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
    DeleteSummary, Patch, Product, ProductFilter, RepositoryError, RepositoryResult,
    UpdateSummary, PRODUCTS,
};
use crate::observability::DatabaseTracingMiddleware;

/// Data access for the `products` collection
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Store a new product. Fails with `ConstraintViolation` when the id is taken.
    async fn insert(&self, product: &Product) -> RepositoryResult<()>;

    async fn find_all(&self) -> RepositoryResult<Vec<Product>>;

    async fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>>;

    /// Exact-match listing on a single attribute
    async fn find_by_attribute(
        &self,
        filter: ProductFilter,
        value: &str,
    ) -> RepositoryResult<Vec<Product>>;

    /// Merge `patch` into the product with `product_id`
    async fn update(&self, product_id: &str, patch: &Patch) -> RepositoryResult<UpdateSummary>;

    async fn delete(&self, product_id: &str) -> RepositoryResult<DeleteSummary>;
}

/// DynamoDB implementation of the ProductRepository trait
pub struct DynamoDbProductRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
    db_tracing: Option<DatabaseTracingMiddleware>,
}

impl DynamoDbProductRepository {
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
            db_tracing: None,
        }
    }

    /// Record every store call in the database metrics
    pub fn with_tracing(mut self, db_tracing: DatabaseTracingMiddleware) -> Self {
        self.db_tracing = Some(db_tracing);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn key(&self, product_id: &str) -> (String, AttributeValue) {
        (
            PRODUCTS.partition_key.to_string(),
            AttributeValue::S(product_id.to_string()),
        )
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

    fn items_to_products(&self, items: Vec<Item>, products: &mut Vec<Product>) {
        for item in items {
            match item_to_model::<Product>(&item) {
                Ok(product) => products.push(product),
                Err(e) => warn!("Skipping unreadable product document: {}", e),
            }
        }
    }

    /// Drain every scan page, optionally filtering on one attribute
    async fn scan(&self, filter: Option<(ProductFilter, &str)>) -> RepositoryResult<Vec<Product>> {
        let mut products = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key.take());

            if let Some((filter, value)) = filter {
                request = request
                    .filter_expression("#attr = :value")
                    .expression_attribute_names("#attr", filter.attribute())
                    .expression_attribute_values(":value", AttributeValue::S(value.to_string()));
            }

            let output = self
                .observe("Scan", async {
                    request
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(&self.table_name, e))
                })
                .await?;

            self.items_to_products(output.items.unwrap_or_default(), &mut products);

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(products)
    }
}

#[async_trait]
impl ProductRepository for DynamoDbProductRepository {
    #[instrument(skip(self, product), fields(table = %self.table_name, product_id = %product.product_id))]
    async fn insert(&self, product: &Product) -> RepositoryResult<()> {
        let item = model_to_item(product)?;

        let result = self
            .observe("PutItem", async {
                self.client
                    .put_item()
                    .table_name(&self.table_name)
                    .set_item(Some(item))
                    .condition_expression("attribute_not_exists(#pk)")
                    .expression_attribute_names("#pk", PRODUCTS.partition_key)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(&self.table_name, e))
            })
            .await;

        match result {
            Ok(_) => {
                info!("Product stored");
                Ok(())
            }
            Err(RepositoryError::ConditionFailed) => Err(RepositoryError::ConstraintViolation {
                message: format!("productId {} already exists", product.product_id),
            }),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Product>> {
        let products = self.scan(None).await?;
        info!("Found {} products", products.len());
        Ok(products)
    }

    #[instrument(skip(self), fields(table = %self.table_name, product_id = %product_id))]
    async fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let (key_name, key_value) = self.key(product_id);

        let output = self
            .observe("GetItem", async {
                self.client
                    .get_item()
                    .table_name(&self.table_name)
                    .key(key_name, key_value)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(&self.table_name, e))
            })
            .await?;

        output
            .item
            .map(|item| item_to_model::<Product>(&item))
            .transpose()
    }

    #[instrument(skip(self), fields(table = %self.table_name, filter = %filter, value = %value))]
    async fn find_by_attribute(
        &self,
        filter: ProductFilter,
        value: &str,
    ) -> RepositoryResult<Vec<Product>> {
        let products = self.scan(Some((filter, value))).await?;
        info!("Found {} products", products.len());
        Ok(products)
    }

    #[instrument(skip(self, patch), fields(table = %self.table_name, product_id = %product_id, fields = patch.len()))]
    async fn update(&self, product_id: &str, patch: &Patch) -> RepositoryResult<UpdateSummary> {
        if patch.is_empty() {
            let matched = self.find_by_id(product_id).await?.is_some();
            return Ok(UpdateSummary::new(u64::from(matched), 0));
        }

        let (key_name, key_value) = self.key(product_id);
        let UpdateExpression {
            expression,
            mut names,
            values,
        } = UpdateExpression::from_patch(patch);
        names.insert("#pk".to_string(), PRODUCTS.partition_key.to_string());

        let result = self
            .observe("UpdateItem", async {
                self.client
                    .update_item()
                    .table_name(&self.table_name)
                    .key(key_name, key_value)
                    .update_expression(expression)
                    .condition_expression("attribute_exists(#pk)")
                    .set_expression_attribute_names(Some(names))
                    .set_expression_attribute_values(Some(values))
                    .return_values(ReturnValue::AllOld)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(&self.table_name, e))
            })
            .await;

        match result {
            Ok(output) => {
                let previous = match output.attributes {
                    Some(attributes) => from_item(&attributes)?,
                    None => Default::default(),
                };
                let modified = patch.would_modify(&previous);
                info!(modified, "Product updated");
                Ok(UpdateSummary::new(1, u64::from(modified)))
            }
            Err(RepositoryError::ConditionFailed) => {
                info!("No product matched update");
                Ok(UpdateSummary::default())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, product_id = %product_id))]
    async fn delete(&self, product_id: &str) -> RepositoryResult<DeleteSummary> {
        let (key_name, key_value) = self.key(product_id);

        let output = self
            .observe("DeleteItem", async {
                self.client
                    .delete_item()
                    .table_name(&self.table_name)
                    .key(key_name, key_value)
                    .return_values(ReturnValue::AllOld)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(&self.table_name, e))
            })
            .await?;

        let deleted = output.attributes.is_some_and(|attributes| !attributes.is_empty());
        info!(deleted, "Product delete finished");
        Ok(DeleteSummary::new(u64::from(deleted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateProductRequest;
    use crate::observability::Metrics;

    fn create_test_client() -> Arc<DynamoDbClient> {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        Arc::new(DynamoDbClient::from_conf(config))
    }

    #[test]
    fn test_repository_creation() {
        let repo = DynamoDbProductRepository::new(
            create_test_client(),
            "products".to_string(),
            "us-east-1".to_string(),
        );
        assert_eq!(repo.table_name(), "products");
        assert!(repo.db_tracing.is_none());

        let metrics = Arc::new(Metrics::new().unwrap());
        let repo = repo.with_tracing(DatabaseTracingMiddleware::new(metrics));
        assert!(repo.db_tracing.is_some());
    }

    #[test]
    fn test_key_uses_product_id() {
        let repo = DynamoDbProductRepository::new(
            create_test_client(),
            "products".to_string(),
            "us-east-1".to_string(),
        );
        let (name, value) = repo.key("abc123");
        assert_eq!(name, "productId");
        assert_eq!(value, AttributeValue::S("abc123".to_string()));
    }

    #[test]
    fn test_unreadable_documents_are_skipped() {
        let repo = DynamoDbProductRepository::new(
            create_test_client(),
            "products".to_string(),
            "us-east-1".to_string(),
        );
        let good = model_to_item(&Product::new(CreateProductRequest {
            name: "Widget".to_string(),
            price: Some(3.5),
            ..Default::default()
        }))
        .unwrap();
        let mut missing_id = good.clone();
        missing_id.remove("productId");

        let mut products = Vec::new();
        repo.items_to_products(vec![good, missing_id], &mut products);

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].price, Some(3.5));
    }

    #[test]
    fn test_large_stored_price_is_readable() {
        let mut item = model_to_item(&Product::new(CreateProductRequest {
            name: "Yacht".to_string(),
            ..Default::default()
        }))
        .unwrap();
        item.insert("price".to_string(), AttributeValue::N("1e100".to_string()));

        let product: Product = item_to_model(&item).unwrap();
        assert_eq!(product.price, Some(1e100));
    }
}
