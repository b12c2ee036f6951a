// src/record.rs - Sample records and their read-back representation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical field names shared by every connector
pub const FIELD_EXTERNAL_ID: &str = "externalId";
pub const FIELD_NUMERIC_ID: &str = "numericId";
pub const FIELD_CITY: &str = "city";

/// Native to canonical name pairs for stores that keep canonical names
pub const CANONICAL_FIELDS: &[(&str, &str)] = &[
    (FIELD_NUMERIC_ID, FIELD_NUMERIC_ID),
    (FIELD_CITY, FIELD_CITY),
];

/// The unit of seeded data. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRecord {
    external_id: String,
    numeric_id: i64,
    city: String,
}

impl SampleRecord {
    pub fn new(external_id: impl Into<String>, numeric_id: i64, city: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            numeric_id,
            city: city.into(),
        }
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn numeric_id(&self) -> i64 {
        self.numeric_id
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    /// Returns a copy with a different city (upsert tests overwrite records this way)
    pub fn with_city(&self, city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            ..self.clone()
        }
    }

    /// `{"externalId": .., "numericId": .., "city": ..}`
    pub fn to_canonical_json(&self) -> serde_json::Value {
        serde_json::json!({
            FIELD_EXTERNAL_ID: self.external_id,
            FIELD_NUMERIC_ID: self.numeric_id,
            FIELD_CITY: self.city,
        })
    }

    /// Field values in canonical form, excluding the identifier
    pub fn expected_fields(&self) -> [(&'static str, FieldValue); 2] {
        [
            (FIELD_NUMERIC_ID, FieldValue::Integer(self.numeric_id)),
            (FIELD_CITY, FieldValue::Text(self.city.clone())),
        ]
    }
}

/// A field value as it arrived from a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON scalar into a field value. Arrays of one element are
    /// unwrapped (graph valueMaps return properties as lists).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FieldValue::Integer(i))
                } else {
                    n.as_f64().map(FieldValue::Float)
                }
            }
            serde_json::Value::Array(items) if items.len() == 1 => Self::from_json(&items[0]),
            _ => None,
        }
    }

    /// Value equality under backend-native coercion
    pub fn matches(&self, expected: &FieldValue) -> bool {
        match (self, expected) {
            (actual, FieldValue::Integer(n)) => actual.as_integer() == Some(*n),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (actual, FieldValue::Float(f)) => actual.as_float() == Some(*f),
            _ => false,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                let candidate = *f as i64;
                (candidate as f64 == *f).then_some(candidate)
            }
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn to_plain_string(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A stored representation translated back into canonical field names
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRecord {
    pub external_id: String,
    pub fields: BTreeMap<String, FieldValue>,
    /// Write version for backends that may hold several copies of one id
    pub version: Option<u64>,
}

impl BackendRecord {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            fields: BTreeMap::new(),
            version: None,
        }
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Build from a flat JSON object; `id_field` names the property carrying the external id
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
        id_field: &str,
        field_names: &[(&str, &str)],
    ) -> Option<Self> {
        let external_id = match object.get(id_field) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => FieldValue::from_json(other)?.to_plain_string(),
            None => return None,
        };

        let mut record = BackendRecord::new(external_id);
        for (native, canonical) in field_names {
            if let Some(value) = object.get(*native).and_then(FieldValue::from_json) {
                record.fields.insert((*canonical).to_string(), value);
            }
        }
        Some(record)
    }
}
