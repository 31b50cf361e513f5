//! Error types for AMF3 encoding and decoding.

use std::fmt;

/// The reference table a back-reference pointed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTable {
    String,
    Object,
    Traits,
}

impl fmt::Display for RefTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Object => write!(f, "object"),
            Self::Traits => write!(f, "traits"),
        }
    }
}

/// Errors that can occur while encoding a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("U29 payload {value} does not fit in 29 bits")]
    IntegerOverflow { value: u64 },

    #[error("nesting depth exceeds limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("empty key cannot be represented in AMF3")]
    EmptyKey,

    #[error("unrepresentable value: {reason}")]
    Unrepresentable { reason: String },
}

/// Errors that can occur while decoding a byte stream.
///
/// Every variant carries the byte offset at which the problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed U29 integer at offset {offset}")]
    MalformedInteger { offset: usize },

    #[error("unknown type marker 0x{marker:02X} at offset {offset}")]
    UnknownTypeMarker { marker: u8, offset: usize },

    #[error("invalid {table} reference #{index} at offset {offset} (table holds {len})")]
    InvalidReference {
        table: RefTable,
        index: usize,
        len: usize,
        offset: usize,
    },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("need {needed} bytes at offset {offset} but only {remaining} remaining")]
    TruncatedStream {
        needed: usize,
        remaining: usize,
        offset: usize,
    },

    #[error("nesting depth exceeds limit of {limit} at offset {offset}")]
    DepthExceeded { limit: usize, offset: usize },

    #[error("unsupported object traits at offset {offset}: {reason}")]
    UnsupportedTraits { reason: String, offset: usize },
}

impl DecodeError {
    /// Byte offset in the input where decoding failed.
    pub fn offset(&self) -> usize {
        match self {
            Self::MalformedInteger { offset }
            | Self::UnknownTypeMarker { offset, .. }
            | Self::InvalidReference { offset, .. }
            | Self::InvalidUtf8 { offset }
            | Self::TruncatedStream { offset, .. }
            | Self::DepthExceeded { offset, .. }
            | Self::UnsupportedTraits { offset, .. } => *offset,
        }
    }

    /// Returns `true` if more input could have let decoding continue.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream { .. } | Self::MalformedInteger { .. }
        )
    }
}
