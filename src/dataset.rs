//! Fixed lookup dataset.
//!
//! A read-only table of JSON records loaded once at startup and shared
//! across all requests without locking. Lookup is total over its input:
//! out-of-range and non-numeric ids map to a fixed placeholder record
//! rather than an error.

use serde_json::{json, Value};

use crate::error::{Result, TurnstileError};

/// Immutable record table indexed by non-negative integer.
pub struct Dataset {
    records: Vec<Value>,
}

impl Dataset {
    /// Small built-in dataset used when no file is configured.
    pub fn builtin() -> Self {
        Self {
            records: vec![
                json!({ "id": 0, "title": "Walk the dog" }),
                json!({ "id": 1, "title": "Water the plants" }),
                json!({ "id": 2, "title": "File the expense report" }),
            ],
        }
    }

    /// Load records from a JSON file containing a top-level array.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<Value> = serde_json::from_str(&contents)
            .map_err(|e| TurnstileError::Config(format!("invalid dataset {}: {}", path, e)))?;
        Ok(Self { records })
    }

    /// Look up a record by its raw path parameter.
    ///
    /// Never fails: anything that does not resolve to an in-range index
    /// yields the placeholder record.
    pub fn lookup(&self, raw_id: &str) -> Value {
        raw_id
            .parse::<usize>()
            .ok()
            .and_then(|index| self.records.get(index))
            .cloned()
            .unwrap_or_else(Self::placeholder)
    }

    /// The record returned for unresolvable ids.
    pub fn placeholder() -> Value {
        json!({ "title": "Invalid item" })
    }

    /// Number of records in the table.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
