//! Query keys and their canonical hash.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{HydrateCoreError, Result};

/// Identifies a single cached data-fetch result.
///
/// A key is an ordered list of JSON segments. Two keys address the same entry
/// when their canonical serialized forms (see [`QueryKey::hash`]) are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    /// Build a key from any sequence of JSON-convertible segments.
    ///
    /// ```
    /// use hydrate_core::QueryKey;
    ///
    /// let key = QueryKey::new(["posts", "list"]);
    /// assert_eq!(key.hash(), r#"["posts","list"]"#);
    /// ```
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Value>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Append a segment.
    pub fn with(mut self, segment: impl Into<Value>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Canonical serialized form used for deduplication and lookup.
    ///
    /// Object segments serialize with sorted field names, so structurally equal
    /// keys hash equally regardless of how they were built. Whole-number floats
    /// are written as integers, so `1.0` and `1` address the same entry.
    pub fn hash(&self) -> String {
        Value::Array(self.0.iter().map(canonical).collect()).to_string()
    }

    /// Key segments in order.
    pub fn segments(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Largest magnitude at which every whole `f64` is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(n) => whole_float(n).map_or_else(|| value.clone(), Value::from),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), canonical(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn whole_float(n: &Number) -> Option<i64> {
    if n.is_i64() || n.is_u64() {
        return None;
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER).then_some(f as i64)
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash())
    }
}

impl TryFrom<Value> for QueryKey {
    type Error = HydrateCoreError;

    /// Arrays become keys as-is, other non-null values become a one-segment key.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(segments) => Ok(Self(segments)),
            Value::Null => Err(HydrateCoreError::InvalidQueryKey(
                "key must not be null".to_string(),
            )),
            other => Ok(Self(vec![other])),
        }
    }
}

impl From<&str> for QueryKey {
    fn from(segment: &str) -> Self {
        Self(vec![Value::from(segment)])
    }
}

impl From<String> for QueryKey {
    fn from(segment: String) -> Self {
        Self(vec![Value::from(segment)])
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(segments: Vec<Value>) -> Self {
        Self(segments)
    }
}
