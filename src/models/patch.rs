use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Number, Value};
use tracing::warn;

use super::errors::{ValidationError, ValidationResult};
use super::schema::{CollectionSchema, FieldKind, FieldSpec};

/// Cast a single JSON value to the storage type declared by `spec`.
///
/// `null` resets the field to its schema default. Values that cannot be
/// represented in the declared type are rejected.
pub fn coerce_value(spec: &FieldSpec, value: Value) -> ValidationResult<Value> {
    if value.is_null() {
        return Ok(spec.default.value());
    }

    let cast_failed = |value: &Value| ValidationError::CastFailed {
        field: spec.name.to_string(),
        expected: spec.kind.as_str().to_string(),
        value: value.to_string(),
    };

    match spec.kind {
        FieldKind::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(cast_failed(&other)),
        },
        FieldKind::Number => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) if s.trim().is_empty() => Ok(spec.default.value()),
            Value::String(s) => parse_number(s.trim()).ok_or_else(|| cast_failed(&value)),
            Value::Bool(b) => Ok(Value::from(u8::from(*b))),
            _ => Err(cast_failed(&value)),
        },
        FieldKind::Integer => match &value {
            Value::Number(n) => integral(n).ok_or_else(|| cast_failed(&value)),
            Value::String(s) if s.trim().is_empty() => Ok(spec.default.value()),
            Value::String(s) => match parse_number(s.trim()) {
                Some(Value::Number(n)) => integral(&n).ok_or_else(|| cast_failed(&value)),
                _ => Err(cast_failed(&value)),
            },
            _ => Err(cast_failed(&value)),
        },
        FieldKind::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(cast_failed(&value)),
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(Value::Bool(true)),
                Some(0) => Ok(Value::Bool(false)),
                _ => Err(cast_failed(&value)),
            },
            _ => Err(cast_failed(&value)),
        },
        FieldKind::Timestamp => {
            let parsed = match &value {
                Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
                _ => None,
            };
            parsed
                .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
                .ok_or_else(|| cast_failed(&value))
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn integral(n: &Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        return Some(Value::from(i));
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            Some(Value::from(f as i64))
        }
        _ => None,
    }
}

/// Cast every schema field present in `body`. Fields unknown to the schema
/// are kept as supplied.
pub fn coerce_document(
    schema: &CollectionSchema,
    body: Value,
) -> ValidationResult<Map<String, Value>> {
    let object = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => return Err(ValidationError::NotAnObject),
    };

    object
        .into_iter()
        .map(|(key, value)| match schema.field(&key) {
            Some(spec) => coerce_value(spec, value).map(|v| (key, v)),
            None => Ok((key, value)),
        })
        .collect()
}

/// A caller-supplied partial update, cast against a collection schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Map<String, Value>,
}

impl Patch {
    /// Build a patch from a request body. Key and other immutable attributes
    /// are dropped.
    pub fn from_value(schema: &CollectionSchema, body: Value) -> ValidationResult<Self> {
        let mut fields = coerce_document(schema, body)?;
        fields.retain(|key, _| {
            let immutable = schema.is_immutable(key);
            if immutable {
                warn!(
                    collection = schema.name,
                    field = %key,
                    "Ignoring attempt to modify immutable field"
                );
            }
            !immutable
        });
        Ok(Self { fields })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set `field` only when the caller did not supply it
    pub fn insert_if_absent(&mut self, field: &str, value: Value) {
        self.fields.entry(field.to_string()).or_insert(value);
    }

    /// Whether applying this patch to `current` would change any attribute
    pub fn would_modify(&self, current: &Map<String, Value>) -> bool {
        self.fields.iter().any(|(key, value)| match current.get(key) {
            Some(existing) => !values_equal(existing, value),
            None => !value.is_null(),
        })
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
