use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::{ValidationError, ValidationResult};
use super::patch::coerce_document;
use super::schema::CART_ITEMS;

fn default_quantity() -> i64 {
    1
}

/// One line in a user's cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Storage identifier distinguishing repeated adds of the same product
    #[serde(skip)]
    pub cart_item_id: String,
    pub user_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request model for adding an item to a cart
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

impl Default for AddCartItemRequest {
    fn default() -> Self {
        Self {
            product_id: String::new(),
            quantity: default_quantity(),
        }
    }
}

impl AddCartItemRequest {
    /// Cast a raw request body; only `productId` and `quantity` are read
    pub fn from_body(body: Value) -> ValidationResult<Self> {
        let mut fields = coerce_document(&CART_ITEMS, body)?;
        fields.retain(|key, _| key == "productId" || key == "quantity");

        serde_json::from_value(Value::Object(fields)).map_err(|e| ValidationError::CastFailed {
            field: "body".to_string(),
            expected: "CartItem".to_string(),
            value: e.to_string(),
        })
    }
}

impl CartItem {
    /// Create a new cart item stamped with the current time
    pub fn new(user_id: String, request: AddCartItemRequest) -> Self {
        let now = Utc::now();
        Self {
            cart_item_id: Uuid::new_v4().to_string(),
            user_id,
            product_id: request.product_id,
            quantity: request.quantity,
            created: now,
            last_modified: now,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_cart_item_timestamps_match() {
        let item = CartItem::new(
            "u1".to_string(),
            AddCartItemRequest {
                product_id: "p1".to_string(),
                quantity: 2,
            },
        );
        assert_eq!(item.created, item.last_modified);
        assert_eq!(item.quantity, 2);
        assert!(!item.cart_item_id.is_empty());
    }

    #[test]
    fn test_add_request_defaults_quantity() {
        let request = AddCartItemRequest::from_body(json!({"productId": "p1"})).unwrap();
        assert_eq!(request.quantity, 1);

        let request = AddCartItemRequest::from_body(json!({"productId": "p1", "quantity": null}))
            .unwrap();
        assert_eq!(request.quantity, 1);
    }

    #[test]
    fn test_add_request_coerces_quantity() {
        let request =
            AddCartItemRequest::from_body(json!({"productId": 77, "quantity": "4"})).unwrap();
        assert_eq!(request.product_id, "77");
        assert_eq!(request.quantity, 4);

        assert!(AddCartItemRequest::from_body(json!({"quantity": "lots"})).is_err());
    }

    #[test]
    fn test_add_request_ignores_other_fields() {
        let request = AddCartItemRequest::from_body(json!({
            "productId": "p1",
            "userId": "someone-else",
            "created": "2020-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(request, AddCartItemRequest {
            product_id: "p1".to_string(),
            quantity: 1,
        });
    }

    #[test]
    fn test_internal_id_is_not_serialized() {
        let item = CartItem::new("u1".to_string(), AddCartItemRequest::default());
        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("cartItemId").is_none());
        assert!(value.get("cart_item_id").is_none());
        assert_eq!(value["userId"], json!("u1"));
        assert_eq!(value["created"], value["lastModified"]);
    }
}
