//! AMF3 binary encoding and decoding.
//!
//! All multi-byte numbers are big-endian. Each encode or decode call owns its
//! reference tables; nothing is shared between calls.

pub mod classify;
pub mod decode;
pub mod encode;
pub mod marker;
pub mod reference;
pub mod u29;

pub use classify::{Classification, Key, classify};
pub use decode::{Decoder, decode};
pub use encode::{DEFAULT_MAX_DEPTH, Encoder, encode};
