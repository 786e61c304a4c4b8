//! Typed key-value metadata
//!
//! This module defines:
//! - MetaValue: closed tagged union over the scalar kinds metainfo may hold
//! - MetainfoSet: insertion-ordered map from string keys to MetaValue
//!
//! ## Equality
//!
//! - Different tags are NEVER equal: `Int32(1) != Int64(1)`
//! - Floats compare by bit pattern so that `Eq` and `Hash` agree
//!   (`NaN == NaN` for identical payloads, `0.0 != -0.0`)
//! - Two sets are equal iff they hold the same keys mapped to equal values,
//!   whatever order the entries were added in

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Scalar metainfo value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetaValue {
    /// Boolean value
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit floating point
    Float32(f32),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string
    String(String),
}

impl MetaValue {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            MetaValue::Bool(_) => "bool",
            MetaValue::Int32(_) => "int32",
            MetaValue::Int64(_) => "int64",
            MetaValue::Float32(_) => "float32",
            MetaValue::Float64(_) => "float64",
            MetaValue::String(_) => "string",
        }
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32 if this is an Int32 value
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            MetaValue::Int32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int64 value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f32 if this is a Float32 value
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            MetaValue::Float32(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float64 value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// False for NaN and infinite floats, which JSON cannot represent
    pub fn is_finite(&self) -> bool {
        match self {
            MetaValue::Float32(f) => f.is_finite(),
            MetaValue::Float64(f) => f.is_finite(),
            _ => true,
        }
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MetaValue::Bool(a), MetaValue::Bool(b)) => a == b,
            (MetaValue::Int32(a), MetaValue::Int32(b)) => a == b,
            (MetaValue::Int64(a), MetaValue::Int64(b)) => a == b,
            (MetaValue::Float32(a), MetaValue::Float32(b)) => a.to_bits() == b.to_bits(),
            (MetaValue::Float64(a), MetaValue::Float64(b)) => a.to_bits() == b.to_bits(),
            (MetaValue::String(a), MetaValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for MetaValue {}

impl Hash for MetaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetaValue::Bool(b) => b.hash(state),
            MetaValue::Int32(i) => i.hash(state),
            MetaValue::Int64(i) => i.hash(state),
            MetaValue::Float32(f) => f.to_bits().hash(state),
            MetaValue::Float64(f) => f.to_bits().hash(state),
            MetaValue::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::Int32(i) => write!(f, "{}", i),
            MetaValue::Int64(i) => write!(f, "{}", i),
            MetaValue::Float32(v) => write!(f, "{}", v),
            MetaValue::Float64(v) => write!(f, "{}", v),
            MetaValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

impl From<i32> for MetaValue {
    fn from(i: i32) -> Self {
        MetaValue::Int32(i)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int64(i)
    }
}

impl From<f32> for MetaValue {
    fn from(f: f32) -> Self {
        MetaValue::Float32(f)
    }
}

impl From<f64> for MetaValue {
    fn from(f: f64) -> Self {
        MetaValue::Float64(f)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::String(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::String(s)
    }
}

/// One persisted metainfo entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEntry {
    /// Entry key
    pub key: String,
    /// Tagged value
    pub value: MetaValue,
}

/// Insertion-ordered set of typed key-value pairs
///
/// Keys are unique. Overwriting a key keeps its original position, so the
/// persisted order is the order keys were first added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MetaEntry>", into = "Vec<MetaEntry>")]
pub struct MetainfoSet {
    entries: Vec<MetaEntry>,
}

impl MetainfoSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or overwrite `key`
    ///
    /// Returns the previous value if the key was present.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Option<MetaValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => Some(std::mem::replace(&mut entry.value, value)),
            None => {
                self.entries.push(MetaEntry { key, value });
                None
            }
        }
    }

    /// Look up `key`
    pub fn get(&self, key: &str) -> Result<&MetaValue> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.value)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn get_typed<T>(
        &self,
        key: &str,
        expected: &'static str,
        extract: impl FnOnce(&MetaValue) -> Option<T>,
    ) -> Result<T> {
        let value = self.get(key)?;
        extract(value).ok_or_else(|| Error::TypeMismatch {
            field: key.to_string(),
            expected: expected.to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Look up a Bool value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get_typed(key, "bool", MetaValue::as_bool)
    }

    /// Look up an Int32 value
    pub fn get_i32(&self, key: &str) -> Result<i32> {
        self.get_typed(key, "int32", MetaValue::as_i32)
    }

    /// Look up an Int64 value
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.get_typed(key, "int64", MetaValue::as_i64)
    }

    /// Look up a Float32 value
    pub fn get_f32(&self, key: &str) -> Result<f32> {
        self.get_typed(key, "float32", MetaValue::as_f32)
    }

    /// Look up a Float64 value
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_typed(key, "float64", MetaValue::as_f64)
    }

    /// Look up a String value
    pub fn get_str(&self, key: &str) -> Result<&str> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| Error::TypeMismatch {
            field: key.to_string(),
            expected: "string".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Check whether `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        let pos = self.entries.iter().position(|e| e.key == key)?;
        Some(self.entries.remove(pos).value)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> + '_ {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the set has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the first entry holding a NaN or infinite float
    pub fn first_non_finite(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| !e.value.is_finite())
            .map(|e| e.key.as_str())
    }

    fn sorted(&self) -> Vec<&MetaEntry> {
        let mut sorted: Vec<&MetaEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));
        sorted
    }
}

impl PartialEq for MetainfoSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|e| other.get(&e.key).map_or(false, |v| *v == e.value))
    }
}

impl Eq for MetainfoSet {}

impl Hash for MetainfoSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Sorted so that the hash is independent of insertion order
        let sorted = self.sorted();
        sorted.len().hash(state);
        for entry in sorted {
            entry.key.hash(state);
            entry.value.hash(state);
        }
    }
}

impl fmt::Display for MetainfoSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", entry.key, entry.value)?;
        }
        write!(f, "}}")
    }
}

impl From<Vec<MetaEntry>> for MetainfoSet {
    fn from(entries: Vec<MetaEntry>) -> Self {
        let mut set = MetainfoSet::new();
        for entry in entries {
            set.set(entry.key, entry.value);
        }
        set
    }
}

impl From<MetainfoSet> for Vec<MetaEntry> {
    fn from(set: MetainfoSet) -> Self {
        set.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_set_and_get() {
        let mut set = MetainfoSet::new();
        set.set("step", 3i32);
        set.set("name", "dycore");
        assert_eq!(set.get("step").unwrap(), &MetaValue::Int32(3));
        assert_eq!(set.get_str("name").unwrap(), "dycore");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_get_missing_key() {
        let set = MetainfoSet::new();
        assert!(matches!(set.get("absent"), Err(Error::KeyNotFound(k)) if k == "absent"));
    }

    #[test]
    fn test_typed_getter_wrong_type() {
        let set = MetainfoSet::new().with("dt", 0.5f64);
        assert!(matches!(set.get_i32("dt"), Err(Error::TypeMismatch { .. })));
        assert_eq!(set.get_f64("dt").unwrap(), 0.5);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut set = MetainfoSet::new().with("a", 1i32).with("b", 2i32);
        let previous = set.set("a", true);
        assert_eq!(previous, Some(MetaValue::Int32(1)));
        let keys: Vec<&str> = set.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(set.get_bool("a").unwrap());
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = MetainfoSet::new().with("x", 1i32).with("y", "s");
        let b = MetainfoSet::new().with("y", "s").with("x", 1i32);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_equality_compares_type() {
        let a = MetainfoSet::new().with("x", 1i32);
        let b = MetainfoSet::new().with("x", 1i64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(MetaValue::Float64(f64::NAN), MetaValue::Float64(f64::NAN));
        assert_ne!(MetaValue::Float64(0.0), MetaValue::Float64(-0.0));
    }

    #[test]
    fn test_remove() {
        let mut set = MetainfoSet::new().with("a", 1i32).with("b", 2i32);
        assert_eq!(set.remove("a"), Some(MetaValue::Int32(1)));
        assert!(!set.contains("a"));
        assert_eq!(set.remove("a"), None);
    }

    #[test]
    fn test_display_insertion_order() {
        let set = MetainfoSet::new().with("it", 2i32).with("tag", "in");
        assert_eq!(set.to_string(), "{it=2, tag=\"in\"}");
    }

    #[test]
    fn test_json_round_trip_preserves_order_and_tags() {
        let set = MetainfoSet::new()
            .with("z", 1i64)
            .with("a", 2.5f32)
            .with("flag", false);
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("\"int64\""));
        let parsed: MetainfoSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
        let keys: Vec<&str> = parsed.keys().collect();
        assert_eq!(keys, vec!["z", "a", "flag"]);
    }

    #[test]
    fn test_first_non_finite() {
        let set = MetainfoSet::new().with("ok", 1.0f64).with("bad", f32::NAN);
        assert_eq!(set.first_non_finite(), Some("bad"));
        assert_eq!(MetainfoSet::new().with("x", f64::MAX).first_non_finite(), None);
    }
}
