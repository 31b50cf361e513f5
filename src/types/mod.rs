//! AMF3 value model.

mod value;

pub use value::{Array, ArrayRef, Object, ObjectRef, Shared, Value};
