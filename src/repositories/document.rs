//! Conversion between JSON documents and DynamoDB items, plus the pieces
//! every table repository shares (error mapping and client spans).

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Error as DynamoDbError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tracing::error;

use crate::models::{Patch, RepositoryError, RepositoryResult};

pub type Item = HashMap<String, AttributeValue>;

pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_item(map)),
    }
}

pub fn from_attribute(attribute: &AttributeValue) -> RepositoryResult<Value> {
    let value = match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => parse_number(n)?,
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(from_attribute)
                .collect::<RepositoryResult<_>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_item(map)?),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n))
                .collect::<RepositoryResult<_>>()?,
        ),
        other => {
            return Err(RepositoryError::InvalidDocument {
                message: format!("Unsupported attribute type: {:?}", other),
            })
        }
    };
    Ok(value)
}

fn parse_number(n: &str) -> RepositoryResult<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::from(u));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| RepositoryError::InvalidDocument {
            message: format!("Invalid number attribute: {}", n),
        })
}

pub fn to_item(document: &Map<String, Value>) -> Item {
    document
        .iter()
        .map(|(key, value)| (key.clone(), to_attribute(value)))
        .collect()
}

pub fn from_item(item: &Item) -> RepositoryResult<Map<String, Value>> {
    item.iter()
        .map(|(key, attribute)| from_attribute(attribute).map(|value| (key.clone(), value)))
        .collect()
}

/// Serialize a model into an item; the model must serialize to a JSON object
pub fn model_to_item<T: Serialize>(model: &T) -> RepositoryResult<Item> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(to_item(&map)),
        other => Err(RepositoryError::InvalidDocument {
            message: format!("Expected an object, got {}", other),
        }),
    }
}

pub fn item_to_model<T: DeserializeOwned>(item: &Item) -> RepositoryResult<T> {
    let document = from_item(item)?;
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// `SET` expression applying a patch, with placeholder names for every attribute
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: Item,
}

impl UpdateExpression {
    pub fn from_patch(patch: &Patch) -> Self {
        let mut assignments = Vec::with_capacity(patch.len());
        let mut names = HashMap::new();
        let mut values = HashMap::new();

        for (index, (field, value)) in patch.iter().enumerate() {
            let name = format!("#f{}", index);
            let placeholder = format!(":v{}", index);
            assignments.push(format!("{} = {}", name, placeholder));
            names.insert(name, field.clone());
            values.insert(placeholder, to_attribute(value));
        }

        Self {
            expression: format!("SET {}", assignments.join(", ")),
            names,
            values,
        }
    }
}

/// Map an SDK failure for a call against `table_name`
pub fn map_sdk_error<E, R>(table_name: &str, error: SdkError<E, R>) -> RepositoryError
where
    DynamoDbError: From<SdkError<E, R>>,
{
    match &error {
        SdkError::DispatchFailure(_) => {
            error!(table = table_name, "DynamoDB dispatch failure");
            return RepositoryError::ConnectionFailed;
        }
        SdkError::TimeoutError(_) => {
            error!(table = table_name, "DynamoDB request timed out");
            return RepositoryError::Timeout;
        }
        _ => {}
    }
    map_dynamodb_error(table_name, error.into())
}

pub fn map_dynamodb_error(table_name: &str, error: DynamoDbError) -> RepositoryError {
    match error {
        DynamoDbError::ConditionalCheckFailedException(_) => RepositoryError::ConditionFailed,
        DynamoDbError::ResourceNotFoundException(_) => {
            error!(table = table_name, "DynamoDB table not found");
            RepositoryError::TableNotFound {
                table_name: table_name.to_string(),
            }
        }
        DynamoDbError::ProvisionedThroughputExceededException(_)
        | DynamoDbError::RequestLimitExceeded(_) => {
            error!(table = table_name, "DynamoDB throughput exceeded");
            RepositoryError::RateLimitExceeded
        }
        other => {
            error!(table = table_name, "DynamoDB error: {:?}", other);
            RepositoryError::AwsSdk {
                message: other.to_string(),
            }
        }
    }
}

/// Client span for one DynamoDB API call
pub fn dynamodb_span(table_name: &str, region: &str, operation: &str) -> tracing::Span {
    tracing::info_span!(
        "DynamoDB",
        "aws.service" = "DynamoDB",
        "aws.operation" = operation,
        "aws.region" = %region,
        "aws.dynamodb.table_name" = %table_name,
        "aws.request_id" = tracing::field::Empty,
        "otel.kind" = "client",
        "otel.name" = format!("DynamoDB.{}", operation),
        "rpc.system" = "aws-api",
        "rpc.service" = "DynamoDB",
        "rpc.method" = operation,
        "db.system" = "dynamodb",
        "db.name" = %table_name,
        "db.operation" = operation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(to_attribute(&json!(null)), AttributeValue::Null(true));
        assert_eq!(to_attribute(&json!(true)), AttributeValue::Bool(true));
        assert_eq!(to_attribute(&json!(9.99)), AttributeValue::N("9.99".to_string()));
        assert_eq!(to_attribute(&json!("x")), AttributeValue::S("x".to_string()));
    }

    #[test]
    fn test_nested_document_survives_conversion() {
        let document = json!({
            "productId": "abc",
            "price": 12,
            "tags": ["a", "b"],
            "dimensions": {"w": 1.5, "h": null}
        });
        let map = document.as_object().unwrap();

        let item = to_item(map);
        assert!(matches!(item.get("tags"), Some(AttributeValue::L(v)) if v.len() == 2));
        assert!(matches!(item.get("dimensions"), Some(AttributeValue::M(_))));

        assert_eq!(Value::Object(from_item(&item).unwrap()), document);
    }

    #[test]
    fn test_numbers_prefer_integers() {
        assert_eq!(from_attribute(&AttributeValue::N("5".into())).unwrap(), json!(5));
        assert_eq!(
            from_attribute(&AttributeValue::N("18446744073709551615".into())).unwrap(),
            json!(u64::MAX)
        );
        assert_eq!(from_attribute(&AttributeValue::N("0.5".into())).unwrap(), json!(0.5));
        assert!(from_attribute(&AttributeValue::N("abc".into())).is_err());
    }

    #[test]
    fn test_string_sets_become_arrays() {
        let attribute = AttributeValue::Ss(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(from_attribute(&attribute).unwrap(), json!(["x", "y"]));
    }

    #[test]
    fn test_update_expression_uses_placeholders() {
        let patch = Patch::from_value(
            &crate::models::PRODUCTS,
            json!({"price": 5, "name": "Gadget"}),
        )
        .unwrap();
        let update = UpdateExpression::from_patch(&patch);

        assert!(update.expression.starts_with("SET "));
        assert_eq!(update.names.len(), 2);
        assert_eq!(update.values.len(), 2);
        let fields: std::collections::HashSet<_> = update.names.values().cloned().collect();
        assert!(fields.contains("price") && fields.contains("name"));
        for (name, field) in &update.names {
            let placeholder = name.replace("#f", ":v");
            assert!(update.expression.contains(&format!("{} = {}", name, placeholder)));
            let expected = to_attribute(patch.get(field).unwrap());
            assert_eq!(update.values.get(&placeholder), Some(&expected));
        }
    }

    #[test]
    fn test_model_round_trip() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Row {
            id: String,
            count: i64,
        }

        let row = Row {
            id: "r1".to_string(),
            count: 3,
        };
        let item = model_to_item(&row).unwrap();
        assert_eq!(item.get("count"), Some(&AttributeValue::N("3".to_string())));
        assert_eq!(item_to_model::<Row>(&item).unwrap(), row);

        assert!(model_to_item(&"scalar").is_err());
    }
}
