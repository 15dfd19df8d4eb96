use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::document::map_sdk_error;
use crate::models::{CollectionSchema, RepositoryError, RepositoryResult};

/// Creates the tables backing each registered collection
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl TableManager {
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }

    /// Create any missing table. A failure for one collection is logged and
    /// the remaining collections are still attempted.
    pub async fn bootstrap(&self, collections: &[(&CollectionSchema, String)]) {
        for (schema, table_name) in collections {
            match self.ensure_table(schema, table_name).await {
                Ok(()) => info!(collection = schema.name, table = %table_name, "Collection ready"),
                Err(e) => error!(
                    collection = schema.name,
                    table = %table_name,
                    error = %e,
                    "Collection bootstrap failed"
                ),
            }
        }
    }

    #[instrument(skip(self, schema), fields(collection = schema.name, table_name = %table_name))]
    pub async fn ensure_table(
        &self,
        schema: &CollectionSchema,
        table_name: &str,
    ) -> RepositoryResult<()> {
        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        info!("Creating table");

        let (attribute_definitions, key_schema) = key_definitions(schema)?;

        self.client
            .create_table()
            .table_name(table_name)
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| map_sdk_error(table_name, e))?;

        self.wait_for_table_active(table_name).await
    }

    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service_error| service_error.is_resource_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(map_sdk_error(table_name, e)),
        }
    }

    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        for _ in 0..self.max_attempts {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| map_sdk_error(table_name, e))?;

            match response.table.and_then(|table| table.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        error!("Timeout waiting for table {} to become active", table_name);
        Err(RepositoryError::Timeout)
    }
}

/// Attribute definitions and key schema for a collection's string keys
fn key_definitions(
    schema: &CollectionSchema,
) -> RepositoryResult<(Vec<AttributeDefinition>, Vec<KeySchemaElement>)> {
    let keys = std::iter::once((schema.partition_key, KeyType::Hash))
        .chain(schema.sort_key.map(|sort_key| (sort_key, KeyType::Range)));

    let mut attribute_definitions = Vec::new();
    let mut key_schema = Vec::new();

    for (name, key_type) in keys {
        attribute_definitions.push(
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(|e| RepositoryError::AwsSdk {
                    message: format!("Failed to build attribute definition: {}", e),
                })?,
        );
        key_schema.push(
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(|e| RepositoryError::AwsSdk {
                    message: format!("Failed to build key schema: {}", e),
                })?,
        );
    }

    Ok((attribute_definitions, key_schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CART_ITEMS, PRODUCTS};

    #[test]
    fn test_products_key_definitions() {
        let (attributes, keys) = key_definitions(&PRODUCTS).unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].attribute_name(), "productId");
        assert_eq!(keys[0].key_type(), &KeyType::Hash);
    }

    #[test]
    fn test_cart_items_key_definitions() {
        let (attributes, keys) = key_definitions(&CART_ITEMS).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(keys[0].attribute_name(), "userId");
        assert_eq!(keys[1].attribute_name(), "cartItemId");
        assert_eq!(keys[1].key_type(), &KeyType::Range);
        assert!(attributes
            .iter()
            .all(|a| a.attribute_type() == &ScalarAttributeType::S));
    }

    #[test]
    fn test_table_manager_creation() {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let manager = TableManager::new(Arc::new(DynamoDbClient::from_conf(config)));
        assert_eq!(manager.max_attempts, 60);
    }
}
