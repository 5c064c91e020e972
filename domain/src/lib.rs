//! Domain library for the injectable store workspace.
//!
//! Holds the record types, the `KeyValueStore` port, the error definitions,
//! the binding registry used to swap stores at test time, and the
//! `CreateUser` operation that consumes a store. Filesystem adapters live in
//! their own crates; only the in-memory store ships here.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a stored record.
///
/// Ids are string-encoded so they map directly onto JSON object keys;
/// numeric ids are rendered in decimal (`1` -> `"1"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the id, if it is written in canonical decimal form.
    /// `"7"` is numeric; `"+7"` and `"007"` are not.
    pub fn as_number(&self) -> Option<u64> {
        self.0
            .parse::<u64>()
            .ok()
            .filter(|n| n.to_string() == self.0)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single field value inside a record.
///
/// The set is closed on purpose: records are schema-less, but every value is
/// one of these kinds. Arrays are not supported. Integers keep their exact
/// value and JSON spelling; only numbers written with a fraction or exponent
/// become `Float`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    #[serde(serialize_with = "serialize_finite")]
    Float(f64),
    String(String),
    Map(BTreeMap<String, Value>),
}

fn serialize_finite<S: serde::Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !n.is_finite() {
        return Err(serde::ser::Error::custom(NonFiniteFloat(*n)));
    }
    serializer.serialize_f64(*n)
}

/// Raised when a NaN or infinite float is turned into a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("non-finite number {0} cannot be stored")]
pub struct NonFiniteFloat(pub f64);

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

// Same variant a JSON reader would produce for the number.
impl From<u64> for Value {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::UInt(n),
        }
    }
}

impl TryFrom<f64> for Value {
    type Error = NonFiniteFloat;

    fn try_from(n: f64) -> Result<Self, Self::Error> {
        if n.is_finite() {
            Ok(Value::Float(n))
        } else {
            Err(NonFiniteFloat(n))
        }
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Map(r.0)
    }
}

/// Schema-less field data stored under a [`RecordId`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert, handy for literals: `Record::new().with("name", "John")`.
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, field: K, value: V) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

/// Full store state as returned by [`KeyValueStore::list`], ordered by id.
pub type Records = BTreeMap<RecordId, Record>;

/// Key-value store port implemented by every persistence backend.
///
/// A missing id is never an error: `get` yields `None` and `remove` is a
/// no-op. `list` hands back an owned snapshot, so callers cannot reach the
/// backing state except through `add` and `remove`.
pub trait KeyValueStore: Send + Sync {
    fn count(&self) -> Result<usize, StoreError>;
    fn list(&self) -> Result<Records, StoreError>;
    fn get(&self, id: &RecordId) -> Result<Option<Record>, StoreError>;
    /// Insert or overwrite the record at `id`.
    fn add(&self, id: RecordId, data: Record) -> Result<(), StoreError>;
    fn remove(&self, id: &RecordId) -> Result<(), StoreError>;
}

/// Store handle shared between the registry and its consumers.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Failures raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("store i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object mapping ids to records.
    #[error("malformed store file {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the registry and operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no store registered under `{0}`")]
    Unbound(String),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

pub mod adapters;
pub mod operation;
pub mod registry;
pub mod validate;
