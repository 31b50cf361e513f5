//! A dynamic host value model.
//!
//! `Table` is an ordered map keyed by integers or strings, the shape of an
//! array in a dynamically typed scripting language; `Record` is a plain
//! object with named fields. Both live behind [`Shared`] handles, so the
//! same instance can appear at several places in a tree, including inside
//! itself.

use crate::codec::classify::Key;
use crate::types::Shared;

/// Handle to a host table.
pub type TableRef = Shared<Table>;

/// Handle to a host record.
pub type RecordRef = Shared<Record>;

/// A host-side value.
#[derive(Debug, Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Table(TableRef),
    Record(RecordRef),
}

impl HostValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Returns `true` if both values are the same table or record instance.
    pub fn same_identity(&self, other: &HostValue) -> bool {
        match (self, other) {
            (Self::Table(a), Self::Table(b)) => a.ptr_eq(b),
            (Self::Record(a), Self::Record(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Table> for HostValue {
    fn from(t: Table) -> Self {
        Self::Table(Shared::new(t))
    }
}

impl From<TableRef> for HostValue {
    fn from(t: TableRef) -> Self {
        Self::Table(t)
    }
}

impl From<Record> for HostValue {
    fn from(r: Record) -> Self {
        Self::Record(Shared::new(r))
    }
}

impl From<RecordRef> for HostValue {
    fn from(r: RecordRef) -> Self {
        Self::Record(r)
    }
}

/// Ordered map with integer or string keys.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<(Key, HostValue)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position if it already exists.
    pub fn set(&mut self, key: impl Into<Key>, value: HostValue) -> Option<HostValue> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Appends `value` under one past the largest non-negative integer key.
    pub fn push(&mut self, value: HostValue) {
        let next = self
            .entries
            .iter()
            .filter_map(|(k, _)| k.as_index())
            .filter(|i| *i >= 0)
            .max()
            .map_or(0, |i| i + 1);
        self.entries.push((Key::Index(next), value));
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&HostValue> {
        let key = key.into();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(Key, HostValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<HostValue> for Table {
    fn from_iter<I: IntoIterator<Item = HostValue>>(iter: I) -> Self {
        let mut table = Self::new();
        for value in iter {
            table.push(value);
        }
        table
    }
}

impl<K: Into<Key>> FromIterator<(K, HostValue)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, HostValue)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (key, value) in iter {
            table.set(key, value);
        }
        table
    }
}

/// Object with named fields in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, HostValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: HostValue) -> Option<HostValue> {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, HostValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
