//! Properties bag attached to every update context.

use parking_lot::RwLock;
use std::any::Any;
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque key into a [`PropertyBag`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey(Cow<'static, str>);

impl PropertyKey {
    /// Creates a key from a static string, usable in `const` items.
    #[must_use]
    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PropertyKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for PropertyKey {
    fn from(key: &'static str) -> Self {
        Self::from_static(key)
    }
}

impl From<String> for PropertyKey {
    fn from(key: String) -> Self {
        Self(Cow::Owned(key))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value stored in a [`PropertyBag`].
#[derive(Clone)]
pub enum PropertyValue {
    /// A boolean flag.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A string.
    Text(String),
    /// Structured data.
    Json(serde_json::Value),
    /// Any shared Rust value, recovered with [`PropertyBag::get_shared`].
    Shared(Arc<dyn Any + Send + Sync>),
}

impl PropertyValue {
    /// Wraps an arbitrary value.
    #[must_use]
    pub fn shared<T: Any + Send + Sync>(value: T) -> Self {
        Self::Shared(Arc::new(value))
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the JSON value, if this is one.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// A thread-safe, lazily allocated metadata map.
///
/// No map is allocated until the first write.
#[derive(Debug, Default)]
pub struct PropertyBag {
    data: RwLock<Option<HashMap<PropertyKey, PropertyValue>>>,
}

impl PropertyBag {
    /// Creates a new empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(
        &self,
        key: impl Into<PropertyKey>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.data
            .write()
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into())
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<PropertyValue> {
        self.data.read().as_ref()?.get(key).cloned()
    }

    /// Gets a shared value downcast to `T`.
    #[must_use]
    pub fn get_shared<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        match self.get(key)? {
            PropertyValue::Shared(value) => value.downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data
            .read()
            .as_ref()
            .is_some_and(|data| data.contains_key(key))
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<PropertyValue> {
        self.data.write().as_mut()?.remove(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().as_ref().map_or(0, HashMap::len)
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.data
            .read()
            .as_ref()
            .map(|data| data.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes every entry, keeping the allocation.
    pub fn clear(&self) {
        if let Some(data) = self.data.write().as_mut() {
            data.clear();
        }
    }

    /// Returns true once the backing map has been allocated.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.data.read().is_some()
    }
}
