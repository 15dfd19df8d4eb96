use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// Storage type of a schema field, used to cast incoming JSON values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Timestamp,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "String",
            FieldKind::Number => "Number",
            FieldKind::Integer => "Integer",
            FieldKind::Boolean => "Boolean",
            FieldKind::Timestamp => "Date",
        }
    }
}

/// Value a field takes when it is absent on insert or reset with `null`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Null,
    EmptyString,
    Bool(bool),
    Integer(i64),
    Now,
}

impl FieldDefault {
    pub fn value(&self) -> Value {
        match self {
            FieldDefault::Null => Value::Null,
            FieldDefault::EmptyString => Value::String(String::new()),
            FieldDefault::Bool(b) => Value::Bool(*b),
            FieldDefault::Integer(i) => Value::from(*i),
            FieldDefault::Now => {
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
}

/// Declarative description of a document collection and its typed fields
#[derive(Debug)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub partition_key: &'static str,
    pub sort_key: Option<&'static str>,
    /// Attributes a patch may never change
    pub immutable: &'static [&'static str],
    pub fields: &'static [FieldSpec],
}

impl CollectionSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_immutable(&self, name: &str) -> bool {
        self.immutable.contains(&name)
    }

    pub fn key_attributes(&self) -> Vec<&'static str> {
        std::iter::once(self.partition_key)
            .chain(self.sort_key)
            .collect()
    }
}

pub const PRODUCTS: CollectionSchema = CollectionSchema {
    name: "products",
    partition_key: "productId",
    sort_key: None,
    immutable: &["productId"],
    fields: &[
        FieldSpec {
            name: "productId",
            kind: FieldKind::String,
            default: FieldDefault::EmptyString,
        },
        FieldSpec {
            name: "name",
            kind: FieldKind::String,
            default: FieldDefault::EmptyString,
        },
        FieldSpec {
            name: "description",
            kind: FieldKind::String,
            default: FieldDefault::EmptyString,
        },
        FieldSpec {
            name: "price",
            kind: FieldKind::Number,
            default: FieldDefault::Null,
        },
        FieldSpec {
            name: "brand",
            kind: FieldKind::String,
            default: FieldDefault::EmptyString,
        },
        FieldSpec {
            name: "cashOnDelivery",
            kind: FieldKind::Boolean,
            default: FieldDefault::Bool(false),
        },
        FieldSpec {
            name: "category",
            kind: FieldKind::String,
            default: FieldDefault::EmptyString,
        },
    ],
};

/// Internal sort key of the cart table, never exposed to callers
pub const CART_ITEM_ID: &str = "cartItemId";

pub const CART_ITEMS: CollectionSchema = CollectionSchema {
    name: "cart_items",
    partition_key: "userId",
    sort_key: Some(CART_ITEM_ID),
    immutable: &["userId", CART_ITEM_ID],
    fields: &[
        FieldSpec {
            name: "userId",
            kind: FieldKind::String,
            default: FieldDefault::EmptyString,
        },
        FieldSpec {
            name: "productId",
            kind: FieldKind::String,
            default: FieldDefault::EmptyString,
        },
        FieldSpec {
            name: "quantity",
            kind: FieldKind::Integer,
            default: FieldDefault::Integer(1),
        },
        FieldSpec {
            name: "created",
            kind: FieldKind::Timestamp,
            default: FieldDefault::Now,
        },
        FieldSpec {
            name: "lastModified",
            kind: FieldKind::Timestamp,
            default: FieldDefault::Now,
        },
    ],
};

/// Every collection the service persists, in bootstrap order
pub fn registered_collections() -> [&'static CollectionSchema; 2] {
    [&PRODUCTS, &CART_ITEMS]
}
