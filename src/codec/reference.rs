//! Reference tables.
//!
//! AMF3 keeps three append-only tables per encode or decode call: strings,
//! composite instances (arrays and objects share one table), and object
//! traits. The encoder maps a key to the index it was first written at; the
//! decoder keeps the materialized entries in the same order, so an index
//! written by one side resolves to the same entry on the other.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use super::u29::MAX_INDEX;
use crate::error::{DecodeError, RefTable};

/// Maximum number of entries a table will hold.
const CAPACITY: usize = MAX_INDEX + 1;

/// Encode-side table: key → index of first occurrence.
#[derive(Debug)]
pub struct RefIndex<K> {
    index: HashMap<K, usize>,
}

impl<K: Hash + Eq> RefIndex<K> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
        }
    }

    /// Returns the index `key` was registered at, or registers it and returns `None`.
    ///
    /// Once the table is full new keys are no longer registered, so they are
    /// written inline every time.
    pub fn find_or_insert<Q>(&mut self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(&idx) = self.index.get(key) {
            return Some(idx);
        }
        let next = self.index.len();
        if next < CAPACITY {
            self.index.insert(key.to_owned(), next);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }
}

impl<K: Hash + Eq> Default for RefIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three encode-side tables for one call.
#[derive(Debug, Default)]
pub struct EncodeTables {
    /// Non-empty strings, by value.
    pub strings: RefIndex<String>,
    /// Arrays and objects, by identity.
    pub objects: RefIndex<usize>,
    /// Traits, by class name (empty for anonymous objects).
    pub traits: RefIndex<String>,
}

/// Decode-side table: entries in the order they were first read.
#[derive(Debug)]
pub struct RefList<T> {
    table: RefTable,
    items: Vec<T>,
}

impl<T> RefList<T> {
    pub fn new(table: RefTable) -> Self {
        Self {
            table,
            items: Vec::new(),
        }
    }

    /// Appends an entry. Entries past the table capacity are dropped, mirroring the encoder.
    pub fn push(&mut self, item: T) {
        if self.items.len() < CAPACITY {
            self.items.push(item);
        }
    }

    /// Resolves a back-reference read at `offset`.
    pub fn get(&self, index: usize, offset: usize) -> Result<&T, DecodeError> {
        self.items
            .get(index)
            .ok_or(DecodeError::InvalidReference {
                table: self.table,
                index,
                len: self.items.len(),
                offset,
            })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
