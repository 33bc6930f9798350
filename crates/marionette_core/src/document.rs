//! Document reader
//!
//! Loaders consume structured documents through the [`DocumentNode`]
//! capability: navigate to a named child, walk array items, and read typed
//! scalars with a default. [`JsonDocument`] / [`JsonNode`] implement it on
//! top of `serde_json`.
//!
//! ```rust,ignore
//! let doc = JsonDocument::parse(br#"{"reel": "hero.h3da", "params": []}"#)?;
//! let root = doc.root();
//! assert_eq!(root.child_str("reel", ""), "hero.h3da");
//! assert_eq!(root.child("params").map_or(0, |p| p.array_item_count()), 0);
//! ```

use serde_json::Value;

use crate::errors::Result;

/// Read-only view of one node in a structured document.
pub trait DocumentNode: Sized + Copy {
    /// Named child of an object node.
    fn child(&self, name: &str) -> Option<Self>;

    /// Number of items if this is an array, otherwise 0.
    fn array_item_count(&self) -> usize;

    /// Array item at `index`.
    fn array_item(&self, index: usize) -> Option<Self>;

    fn as_int(&self) -> Option<i64>;
    fn as_float(&self) -> Option<f64>;
    fn as_bool(&self) -> Option<bool>;
    fn as_str(&self) -> Option<&str>;

    fn child_int(&self, name: &str, default: i64) -> i64 {
        self.child(name).and_then(|c| c.as_int()).unwrap_or(default)
    }

    fn child_float(&self, name: &str, default: f32) -> f32 {
        self.child(name)
            .and_then(|c| c.as_float())
            .map_or(default, |v| v as f32)
    }

    fn child_bool(&self, name: &str, default: bool) -> bool {
        self.child(name).and_then(|c| c.as_bool()).unwrap_or(default)
    }

    /// Owned string child, or `default` when absent or not a string.
    fn child_string(&self, name: &str, default: &str) -> String {
        self.child(name)
            .and_then(|c| c.as_str().map(str::to_owned))
            .unwrap_or_else(|| default.to_owned())
    }

    /// Number of array items under `name`; 0 when the key is absent.
    fn child_count(&self, name: &str) -> usize {
        self.child(name).map_or(0, |c| c.array_item_count())
    }
}

/// An owned, parsed JSON document.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    root: Value,
}

impl JsonDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = serde_json::from_slice(bytes)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> JsonNode<'_> {
        JsonNode(&self.root)
    }
}

/// Borrowed node inside a [`JsonDocument`].
#[derive(Debug, Clone, Copy)]
pub struct JsonNode<'a>(pub &'a Value);

impl<'a> JsonNode<'a> {
    /// String child, or `default` when absent or not a string.
    #[must_use]
    pub fn child_str(&self, name: &str, default: &'a str) -> &'a str {
        self.0.get(name).and_then(Value::as_str).unwrap_or(default)
    }

    #[must_use]
    pub fn value(&self) -> &'a Value {
        self.0
    }
}

impl DocumentNode for JsonNode<'_> {
    fn child(&self, name: &str) -> Option<Self> {
        self.0.get(name).map(JsonNode)
    }

    fn array_item_count(&self) -> usize {
        self.0.as_array().map_or(0, Vec::len)
    }

    fn array_item(&self, index: usize) -> Option<Self> {
        self.0.as_array()?.get(index).map(JsonNode)
    }

    fn as_int(&self) -> Option<i64> {
        match self.0 {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self.0 {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self.0 {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}
