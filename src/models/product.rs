use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::{ValidationError, ValidationResult};
use super::patch::coerce_document;
use super::schema::PRODUCTS;

const PRODUCT_ID_LEN: usize = 10;

/// Catalog product as stored in the `products` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub cash_on_delivery: bool,
    #[serde(default)]
    pub category: String,
    /// Attributes added through edits that the catalog schema does not name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields accepted when creating a product
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub cash_on_delivery: bool,
    #[serde(default)]
    pub category: String,
}

impl CreateProductRequest {
    /// Cast a raw request body to the product schema. Attributes outside the
    /// schema are ignored and `title` is accepted in place of `name`.
    pub fn from_body(body: Value) -> ValidationResult<Self> {
        let mut body = match body {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ValidationError::NotAnObject),
        };
        if let Some(title) = body.remove("title") {
            body.entry("name".to_string()).or_insert(title);
        }

        let mut fields = coerce_document(&PRODUCTS, Value::Object(body))?;
        fields.retain(|key, _| PRODUCTS.field(key).is_some());

        serde_json::from_value(Value::Object(fields)).map_err(|e| ValidationError::CastFailed {
            field: "body".to_string(),
            expected: "Product".to_string(),
            value: e.to_string(),
        })
    }
}

impl Product {
    /// Create a new product with a freshly generated identifier
    pub fn new(request: CreateProductRequest) -> Self {
        Self {
            product_id: generate_product_id(),
            name: request.name,
            description: request.description,
            price: request.price,
            brand: request.brand,
            cash_on_delivery: request.cash_on_delivery,
            category: request.category,
            extra: Map::new(),
        }
    }

    /// Replace the identifier, used when an insert collides
    pub fn regenerate_id(&mut self) {
        self.product_id = generate_product_id();
    }
}

/// Short opaque url-safe identifier
pub fn generate_product_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(PRODUCT_ID_LEN)
        .collect()
}

/// Which product attribute an exact-match listing filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFilter {
    Brand,
    Category,
}

impl ProductFilter {
    pub fn attribute(&self) -> &'static str {
        match self {
            ProductFilter::Brand => "brand",
            ProductFilter::Category => "category",
        }
    }
}

impl std::fmt::Display for ProductFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.attribute())
    }
}
