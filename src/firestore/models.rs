//! Firestore's typed-value wire format.
//!
//! Every field value on the wire is an object holding exactly one type key, e.g.
//! `{"integerValue": "42"}` or `{"arrayValue": {"values": [...]}}`.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashMap;
use thiserror::Error;

const STRING_VALUE: &str = "stringValue";
const INTEGER_VALUE: &str = "integerValue";
const DOUBLE_VALUE: &str = "doubleValue";
const BOOLEAN_VALUE: &str = "booleanValue";
const ARRAY_VALUE: &str = "arrayValue";
const MAP_VALUE: &str = "mapValue";

const VALUE_KEYS: [&str; 6] = [
    STRING_VALUE,
    INTEGER_VALUE,
    DOUBLE_VALUE,
    BOOLEAN_VALUE,
    ARRAY_VALUE,
    MAP_VALUE,
];

/// Raised when a JSON payload does not match Firestore's value or document shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed value: {0}")]
    MalformedValue(String),
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

fn malformed(msg: impl Into<String>) -> DecodeError {
    DecodeError::MalformedValue(msg.into())
}

/// A single Firestore field value.
///
/// Equality follows `f64`, so `Double(NaN)` never compares equal to itself, even after it
/// survives an encode/decode round trip. Check such values with `f64::is_nan`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    /// Sent over the wire as a decimal string.
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Encodes the value into its single-key wire object.
    pub fn encode(&self) -> JsonValue {
        let (key, payload) = match self {
            Value::String(s) => (STRING_VALUE, JsonValue::String(s.clone())),
            Value::Integer(i) => (INTEGER_VALUE, JsonValue::String(i.to_string())),
            Value::Double(d) => (DOUBLE_VALUE, encode_double(*d)),
            Value::Boolean(b) => (BOOLEAN_VALUE, JsonValue::Bool(*b)),
            Value::Array(values) => {
                let values = values.iter().map(Value::encode).collect();
                let mut inner = Map::new();
                inner.insert("values".to_string(), JsonValue::Array(values));
                (ARRAY_VALUE, JsonValue::Object(inner))
            }
            Value::Map(fields) => {
                let mut inner = Map::new();
                inner.insert("fields".to_string(), encode_fields(fields));
                (MAP_VALUE, JsonValue::Object(inner))
            }
        };

        let mut object = Map::new();
        object.insert(key.to_string(), payload);
        JsonValue::Object(object)
    }

    /// Decodes a wire object, requiring exactly one recognized type key.
    pub fn decode(json: &JsonValue) -> Result<Self, DecodeError> {
        let object = json
            .as_object()
            .ok_or_else(|| malformed(format!("expected an object, got {}", json)))?;

        let mut present = VALUE_KEYS.iter().filter(|key| object.contains_key(**key));
        let key = match (present.next(), present.next()) {
            (Some(key), None) => *key,
            (None, _) => {
                return Err(malformed(format!("no recognized value key in {}", json)));
            }
            (Some(first), Some(second)) => {
                return Err(malformed(format!(
                    "more than one value key present ({}, {})",
                    first, second
                )));
            }
        };
        let payload = &object[key];

        match key {
            STRING_VALUE => payload
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| malformed(format!("stringValue must be a string, got {}", payload))),
            INTEGER_VALUE => {
                let digits = payload.as_str().ok_or_else(|| {
                    malformed(format!("integerValue must be a decimal string, got {}", payload))
                })?;
                digits
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|e| malformed(format!("integerValue '{}': {}", digits, e)))
            }
            DOUBLE_VALUE => decode_double(payload).map(Value::Double),
            BOOLEAN_VALUE => payload
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| malformed(format!("booleanValue must be a boolean, got {}", payload))),
            ARRAY_VALUE => {
                let inner = payload
                    .as_object()
                    .ok_or_else(|| malformed("arrayValue must be an object"))?;
                match inner.get("values") {
                    // Firestore drops `values` for empty arrays.
                    None => Ok(Value::Array(Vec::new())),
                    Some(JsonValue::Array(values)) => values
                        .iter()
                        .map(Value::decode)
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array),
                    Some(other) => Err(malformed(format!(
                        "arrayValue.values must be an array, got {}",
                        other
                    ))),
                }
            }
            MAP_VALUE => {
                let inner = payload
                    .as_object()
                    .ok_or_else(|| malformed("mapValue must be an object"))?;
                match inner.get("fields") {
                    None => Ok(Value::Map(HashMap::new())),
                    Some(fields) => decode_fields(fields).map(Value::Map),
                }
            }
            _ => unreachable!("key is drawn from VALUE_KEYS"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }
}

// Firestore's JSON mapping spells non-finite doubles as strings.
fn encode_double(d: f64) -> JsonValue {
    match Number::from_f64(d) {
        Some(n) => JsonValue::Number(n),
        None if d.is_nan() => JsonValue::String("NaN".to_string()),
        None if d.is_sign_positive() => JsonValue::String("Infinity".to_string()),
        None => JsonValue::String("-Infinity".to_string()),
    }
}

fn decode_double(payload: &JsonValue) -> Result<f64, DecodeError> {
    match payload {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| malformed(format!("doubleValue out of range: {}", n))),
        JsonValue::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => Err(malformed(format!("doubleValue must be a number, got \"{}\"", s))),
        },
        other => Err(malformed(format!("doubleValue must be a number, got {}", other))),
    }
}

pub(crate) fn encode_fields(fields: &HashMap<String, Value>) -> JsonValue {
    let object = fields
        .iter()
        .map(|(name, value)| (name.clone(), value.encode()))
        .collect::<Map<_, _>>();
    JsonValue::Object(object)
}

fn decode_fields(json: &JsonValue) -> Result<HashMap<String, Value>, DecodeError> {
    let object = json
        .as_object()
        .ok_or_else(|| malformed(format!("fields must be an object, got {}", json)))?;
    object
        .iter()
        .map(|(name, value)| Ok((name.clone(), Value::decode(value)?)))
        .collect()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Value::decode(&json).map_err(D::Error::custom)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(values)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(fields: HashMap<String, Value>) -> Self {
        Value::Map(fields)
    }
}

/// A Firestore document.
///
/// Request documents only carry `fields`. The server fills in `name`, `create_time` and
/// `update_time` on responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Adds or replaces a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The document ID, taken from the last segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .filter(|id| !id.is_empty())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.create_time.as_deref())
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.update_time.as_deref())
    }

    pub fn encode(&self) -> JsonValue {
        let mut object = Map::new();
        object.insert("fields".to_string(), encode_fields(&self.fields));
        if let Some(name) = &self.name {
            object.insert("name".to_string(), JsonValue::String(name.clone()));
        }
        if let Some(create_time) = &self.create_time {
            object.insert("createTime".to_string(), JsonValue::String(create_time.clone()));
        }
        if let Some(update_time) = &self.update_time {
            object.insert("updateTime".to_string(), JsonValue::String(update_time.clone()));
        }
        JsonValue::Object(object)
    }

    pub fn decode(json: &JsonValue) -> Result<Self, DecodeError> {
        let object = json.as_object().ok_or_else(|| {
            DecodeError::MalformedDocument(format!("expected an object, got {}", json))
        })?;

        let fields = match object.get("fields") {
            None => HashMap::new(),
            Some(fields @ JsonValue::Object(_)) => decode_fields(fields)?,
            Some(other) => {
                return Err(DecodeError::MalformedDocument(format!(
                    "fields must be an object, got {}",
                    other
                )));
            }
        };

        Ok(Self {
            fields,
            name: optional_string(object, "name")?,
            create_time: optional_string(object, "createTime")?,
            update_time: optional_string(object, "updateTime")?,
        })
    }
}

fn optional_string(object: &Map<String, JsonValue>, key: &str) -> Result<Option<String>, DecodeError> {
    match object.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DecodeError::MalformedDocument(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}
