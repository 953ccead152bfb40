//! Normalized HTTP results and response-shape helpers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Status reported when no response was received at all.
pub const TRANSPORT_FAILURE_STATUS: u16 = 503;

/// Outcome of one request against the target system.
///
/// Built fresh for every call and never mutated afterwards. HTTP errors and
/// transport failures are represented here too, so callers branch on
/// `status` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResult {
    pub status: u16,
    /// Parsed JSON, the raw text as a JSON string, or `Null` for no body
    pub data: Value,
    /// Response headers, names lower-cased
    pub headers: BTreeMap<String, String>,
}

impl HttpResult {
    pub fn new(status: u16, data: Value, headers: BTreeMap<String, String>) -> Self {
        Self {
            status,
            data,
            headers,
        }
    }

    /// Build a result from a raw response body, never failing on bad JSON
    pub fn from_body(status: u16, body: &str, headers: BTreeMap<String, String>) -> Self {
        Self::new(status, parse_body(body), headers)
    }

    /// Synthetic result for a request that never got a response
    pub fn transport_failure(message: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::new(
            TRANSPORT_FAILURE_STATUS,
            json!({
                "message": message.into(),
                "error": error.to_string(),
            }),
            BTreeMap::new(),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Top-level field of an object body
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_object().and_then(|obj| obj.get(name))
    }

    /// Error message the target attached to the body, if any.
    ///
    /// Looks at `message`, then `error`, then a plain-text body.
    pub fn message(&self) -> Option<&str> {
        self.field("message")
            .and_then(Value::as_str)
            .or_else(|| self.field("error").and_then(Value::as_str))
            .or_else(|| self.data.as_str())
    }

    /// Whether the message contains any of `needles`, ignoring case
    pub fn message_contains_any(&self, needles: &[&str]) -> bool {
        let Some(message) = self.message() else {
            return false;
        };
        let message = message.to_lowercase();
        needles
            .iter()
            .any(|needle| message.contains(&needle.to_lowercase()))
    }

    /// `id` of the created or fetched resource
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.field("id").and_then(ResourceId::from_value)
    }

    /// The body as a normalized list, if it has a list shape
    pub fn list(&self) -> Option<ListBody> {
        normalize_list(&self.data)
    }
}

fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Opaque identifier of a resource created on the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accepts JSON numbers and non-empty strings
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Pagination envelope metadata. Every field is optional because the
/// target is not consistent about which ones it sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_elements: Option<u64>,
    pub total_pages: Option<u64>,
    pub number: Option<u64>,
    pub size: Option<u64>,
    pub first: Option<bool>,
    pub last: Option<bool>,
    pub sort: Option<Value>,
    /// Some endpoints report `total` instead of `totalElements`
    pub total: Option<u64>,
}

impl PageMeta {
    pub fn total(&self) -> Option<u64> {
        self.total_elements.or(self.total)
    }
}

/// A list response in either of the shapes the target returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ListBody {
    /// Bare JSON array
    Array { items: Vec<Value> },
    /// `{content: [...], totalElements, ...}` envelope
    Page { items: Vec<Value>, meta: PageMeta },
}

impl ListBody {
    pub fn items(&self) -> &[Value] {
        match self {
            ListBody::Array { items } | ListBody::Page { items, .. } => items,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            ListBody::Array { items } | ListBody::Page { items, .. } => items,
        }
    }

    pub fn meta(&self) -> Option<&PageMeta> {
        match self {
            ListBody::Array { .. } => None,
            ListBody::Page { meta, .. } => Some(meta),
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// Classify a body as a list. Checks for a `content` array first, then
/// for a bare array; anything else is not a list.
pub fn normalize_list(body: &Value) -> Option<ListBody> {
    match body {
        Value::Object(obj) => {
            let items = obj.get("content")?.as_array()?.clone();
            // Metadata is advisory; a malformed field must not hide the items.
            let meta = serde_json::from_value::<PageMeta>(body.clone()).unwrap_or_default();
            Some(ListBody::Page { items, meta })
        }
        Value::Array(items) => Some(ListBody::Array {
            items: items.clone(),
        }),
        _ => None,
    }
}
