//! Raw records and the required field contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields every user record must carry, in contract order.
pub const USER_FIELDS: [&str; 10] = [
    "name", "userId", "email", "role", "position", "team", "subTeam", "lead", "hr", "isActive",
];

/// A mapping of field name to value with no identity until validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder method to set a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Get a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns true if the record carries the named field.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Field names of this record.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable reference used in error reports.
    ///
    /// Prefers `userId`, then `email`, falling back to `fallback` (usually the
    /// record's position in the batch).
    pub fn reference(&self, fallback: usize) -> String {
        ["userId", "email"]
            .iter()
            .find_map(|key| match self.0.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| format!("#{}", fallback))
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Ordered set of field names every record must contain exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFieldSet {
    fields: Vec<String>,
}

impl RequiredFieldSet {
    /// Create a field set; duplicate names are collapsed keeping first occurrence.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !ordered.contains(&field) {
                ordered.push(field);
            }
        }
        Self { fields: ordered }
    }

    /// The user record contract.
    pub fn user_records() -> Self {
        Self::new(USER_FIELDS)
    }

    /// Returns true if `name` belongs to the set.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Iterate field names in contract order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Number of required fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no fields are required.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First required field that is absent or blank in `record`.
    ///
    /// Blank means `null`, an empty string or numeric zero; `false` counts as
    /// present so boolean flags like `isActive` may be unset.
    pub fn first_blank<'a>(&'a self, record: &RawRecord) -> Option<&'a str> {
        self.iter().find(|field| match record.get(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Number(n)) => n.as_f64() == Some(0.0),
            Some(_) => false,
        })
    }
}
