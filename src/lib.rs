//! amf3r: a pure-Rust AMF3 codec.
//!
//! AMF3 is the binary serialization format of the ActionScript 3 runtime.
//! This crate encodes a [`Value`] tree into a single self-delimiting AMF3
//! value and decodes it back, preserving shared and cyclic references.
//!
//! # Architecture
//!
//! - **`types`**: the value model (`Value`, `Array`, `Object`, shared handles)
//! - **`codec`**: U29 integers, array classification, reference tables, encoder and decoder
//! - **`adapter`**: conversion between a host value model and `Value`
//! - **`error`**: encode and decode errors
//!
//! # Example
//!
//! ```
//! use amf3r::{Value, decode, encode};
//!
//! let shared = Value::from(vec![Value::from("x")]);
//! let root = Value::from(vec![shared.clone(), shared]);
//!
//! let bytes = encode(&root).unwrap();
//! let (decoded, consumed) = decode(&bytes).unwrap();
//! assert_eq!(consumed, bytes.len());
//! assert_eq!(decoded, root);
//! ```

pub mod adapter;
pub mod codec;
pub mod error;
pub mod types;

pub use adapter::{HostAdapter, ValueAdapter, decode_host, encode_host};
pub use codec::{Decoder, Encoder, decode, encode};
pub use error::{DecodeError, EncodeError};
pub use types::{Array, ArrayRef, Object, ObjectRef, Shared, Value};
