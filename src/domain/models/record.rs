//! Intent and realized record models.
//!
//! Intent records are written by a scenario; realized records are produced
//! asynchronously by the external control loop and are only ever read here.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::table::{IntentTable, RealizedTable};

/// Field payloads of an intent record.
pub type FieldMap = BTreeMap<String, Vec<u8>>;

/// Attribute map of a realized record, values in normalized string form.
pub type AttributeMap = BTreeMap<String, String>;

/// Opaque identifier assigned by the external system on materialization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealizedKey(String);

impl RealizedKey {
    /// Wrap a key as read from the realized store.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RealizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RealizedKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for RealizedKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Ordered set of realized keys as observed in one poll.
pub type KeySet = BTreeSet<RealizedKey>;

/// A declarative configuration entry written into the intent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRecord {
    /// Intent table.
    pub table: IntentTable,
    /// Intent key.
    pub key: String,
    /// Encoded field values.
    pub fields: FieldMap,
}

impl IntentRecord {
    /// Record for `key` in `table`.
    pub fn new(table: IntentTable, key: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            table,
            key: key.into(),
            fields,
        }
    }

    /// Reference to this record.
    pub fn to_ref(&self) -> IntentRef {
        IntentRef::new(self.table, self.key.clone())
    }

    /// Identifier used when claiming realized keys for this intent.
    pub fn intent_id(&self) -> String {
        self.to_ref().intent_id()
    }
}

/// Reference to an intent record by table and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IntentRef {
    /// Intent table.
    pub table: IntentTable,
    /// Intent key.
    pub key: String,
}

impl IntentRef {
    /// Reference `key` in `table`.
    pub fn new(table: IntentTable, key: impl Into<String>) -> Self {
        Self {
            table,
            key: key.into(),
        }
    }

    /// Identifier used when claiming realized keys.
    pub fn intent_id(&self) -> String {
        format!("{}:{}", self.table.name(), self.key)
    }
}

impl fmt::Display for IntentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table.name(), self.key)
    }
}

/// A materialized record read back from the realized store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealizedRecord {
    /// Realized table.
    pub table: RealizedTable,
    /// Realized key.
    pub key: RealizedKey,
    /// Normalized attribute values.
    pub attributes: AttributeMap,
}

impl RealizedRecord {
    /// Value of attribute `name`, if set.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Key set captured before an intent write; the "before" side of a set difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineSnapshot {
    table: RealizedTable,
    keys: KeySet,
}

impl BaselineSnapshot {
    /// Baseline of `keys` in `table`.
    pub fn new(table: RealizedTable, keys: KeySet) -> Self {
        Self { table, keys }
    }

    /// Baseline of a table known to be empty.
    pub fn empty(table: RealizedTable) -> Self {
        Self::new(table, KeySet::new())
    }

    /// Build a baseline from keys resolved by earlier related writes.
    pub fn from_claimed<'a>(
        table: RealizedTable,
        claimed: impl IntoIterator<Item = &'a RealizedKey>,
    ) -> Self {
        Self::new(table, claimed.into_iter().cloned().collect())
    }

    /// Table the keys were read from.
    pub const fn table(&self) -> RealizedTable {
        self.table
    }

    /// Captured keys.
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Number of captured keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `key` predates the write.
    pub fn contains(&self, key: &RealizedKey) -> bool {
        self.keys.contains(key)
    }

    /// Keys present in `observed` that were not part of this baseline.
    pub fn new_keys(&self, observed: &KeySet) -> Vec<RealizedKey> {
        observed.difference(&self.keys).cloned().collect()
    }
}
