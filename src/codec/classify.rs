//! Dense-versus-associative classification of keyed collections.
//!
//! A collection is dense when its keys, in iteration order, are exactly
//! `0, 1, 2, ..`. Otherwise the longest such run at the front is the dense
//! prefix and every entry after it (gaps, out-of-order or negative integers,
//! string keys) is sparse.

use std::borrow::Borrow;
use std::fmt;

/// A key of an associative collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(i64),
    Name(String),
}

impl Key {
    /// Parses a string key, turning canonical decimal integers into indices.
    ///
    /// `"7"` and `"-3"` are indices; `"07"`, `"-0"`, `"+1"` and `""` are names.
    pub fn parse(s: &str) -> Self {
        if is_canonical_integer(s) {
            if let Ok(i) = s.parse::<i64>() {
                return Self::Index(i);
            }
        }
        Self::Name(s.to_owned())
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Name(_) => None,
        }
    }
}

fn is_canonical_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    match digits.as_bytes() {
        [] => false,
        [b'0'] => digits.len() == s.len(),
        [first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.iter().all(u8::is_ascii_digit)
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Index(i)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Index(i as i64)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// Result of classifying a keyed collection.
#[derive(Debug, PartialEq)]
pub enum Classification<'a, E> {
    /// Every key is covered by `0..n`.
    Dense(usize),
    /// The first `dense_prefix` entries are dense; `sparse` holds the rest.
    Associative {
        dense_prefix: usize,
        sparse: &'a [E],
    },
}

impl<E> Classification<'_, E> {
    /// Number of entries written in the dense section.
    pub fn dense_count(&self) -> usize {
        match self {
            Self::Dense(n) => *n,
            Self::Associative { dense_prefix, .. } => *dense_prefix,
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, Self::Dense(_))
    }
}

/// Classifies `entries` by their keys in iteration order.
pub fn classify<K: Borrow<Key>, V>(entries: &[(K, V)]) -> Classification<'_, (K, V)> {
    let dense = entries
        .iter()
        .enumerate()
        .take_while(|(i, (key, _))| {
            <K as Borrow<Key>>::borrow(key).as_index() == Some(*i as i64)
        })
        .count();
    if dense == entries.len() {
        Classification::Dense(dense)
    } else {
        Classification::Associative {
            dense_prefix: dense,
            sparse: &entries[dense..],
        }
    }
}
