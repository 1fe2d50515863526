//! Conversion of record types into Bolt parameter maps.
//!
//! Optional fields are omitted when absent; Cypher reads a missing map key
//! as `null`, which keeps `SET n += item` idempotent across re-runs.

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltString, BoltType};

pub fn string(value: &str) -> BoltType {
    BoltType::String(BoltString::from(value))
}

pub fn integer(value: i64) -> BoltType {
    BoltType::Integer(BoltInteger { value })
}

pub fn float(value: f64) -> BoltType {
    BoltType::Float(BoltFloat { value })
}

pub fn boolean(value: bool) -> BoltType {
    BoltType::Boolean(BoltBoolean { value })
}

pub fn string_list(values: &[String]) -> BoltType {
    BoltType::List(BoltList {
        value: values.iter().map(|v| string(v)).collect(),
    })
}

pub fn list(values: Vec<BoltType>) -> BoltType {
    BoltType::List(BoltList { value: values })
}

fn empty_map() -> BoltMap {
    BoltMap {
        value: Default::default(),
    }
}

pub fn map(entries: Vec<(&str, BoltType)>) -> BoltType {
    let mut bolt = empty_map();
    for (key, value) in entries {
        bolt.value.insert(BoltString::from(key), value);
    }
    BoltType::Map(bolt)
}

/// Builder for a Bolt map that skips absent optional fields.
pub struct MapBuilder {
    inner: BoltMap,
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MapBuilder {
    pub fn new() -> Self {
        Self { inner: empty_map() }
    }

    pub fn put(mut self, key: &str, value: BoltType) -> Self {
        self.inner.value.insert(BoltString::from(key), value);
        self
    }

    pub fn put_str(self, key: &str, value: &str) -> Self {
        self.put(key, string(value))
    }

    pub fn put_opt_str(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.put(key, string(v)),
            None => self,
        }
    }

    pub fn put_i64(self, key: &str, value: i64) -> Self {
        self.put(key, integer(value))
    }

    pub fn put_opt_i64(self, key: &str, value: Option<i64>) -> Self {
        match value {
            Some(v) => self.put(key, integer(v)),
            None => self,
        }
    }

    pub fn put_f64(self, key: &str, value: f64) -> Self {
        self.put(key, float(value))
    }

    pub fn put_bool(self, key: &str, value: bool) -> Self {
        self.put(key, boolean(value))
    }

    pub fn put_string_list(self, key: &str, values: &[String]) -> Self {
        self.put(key, string_list(values))
    }

    pub fn build(self) -> BoltType {
        BoltType::Map(self.inner)
    }
}
