//! AMF3 encoding: `Value` → bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::classify::Classification;
use super::marker;
use super::reference::EncodeTables;
use super::u29::{self, encode_flagged, encode_u29};
use crate::error::EncodeError;
use crate::types::{ArrayRef, ObjectRef, Value};

/// Default nesting limit for encoding and decoding.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Encodes values with a given configuration.
///
/// Every call starts from empty reference tables; nothing carries over
/// between calls.
#[derive(Debug, Clone)]
pub struct Encoder {
    max_depth: usize,
    force_object: bool,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            force_object: false,
        }
    }

    /// Sets the maximum nesting depth of arrays and objects.
    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Writes associative arrays as anonymous objects.
    pub fn force_object(mut self, enabled: bool) -> Self {
        self.force_object = enabled;
        self
    }

    /// Encodes `value` into a new buffer.
    pub fn encode(&self, value: &Value) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf, value)?;
        tracing::trace!(bytes = buf.len(), "encoded AMF3 value");
        Ok(buf.freeze())
    }

    /// Appends the encoding of `value` to `buf`.
    ///
    /// On error `buf` is left as it was before the call.
    pub fn encode_into(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let start = buf.len();
        let result = Session {
            config: self,
            buf: &mut *buf,
            tables: EncodeTables::default(),
        }
        .value(value, 0);
        if result.is_err() {
            buf.truncate(start);
        }
        result
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes `value` with the default configuration.
pub fn encode(value: &Value) -> Result<Bytes, EncodeError> {
    Encoder::new().encode(value)
}

/// State of a single encode call.
struct Session<'a> {
    config: &'a Encoder,
    buf: &'a mut BytesMut,
    tables: EncodeTables,
}

impl Session<'_> {
    fn value(&mut self, value: &Value, depth: usize) -> Result<(), EncodeError> {
        match value {
            Value::Undefined => self.buf.put_u8(marker::UNDEFINED),
            Value::Null => self.buf.put_u8(marker::NULL),
            Value::Boolean(b) => self.buf.put_u8(if *b { marker::TRUE } else { marker::FALSE }),
            Value::Integer(i) => self.integer(*i)?,
            Value::Double(d) => self.double(*d),
            Value::String(s) => {
                self.buf.put_u8(marker::STRING);
                self.string(s)?;
            }
            Value::Array(a) => self.array(a, depth)?,
            Value::Object(o) => self.object(o, depth)?,
        }
        Ok(())
    }

    /// Integers outside the 29-bit range are promoted to doubles.
    fn integer(&mut self, value: i32) -> Result<(), EncodeError> {
        if u29::fits_int(i64::from(value)) {
            self.buf.put_u8(marker::INTEGER);
            encode_u29(self.buf, u29::int_to_u29(value))
        } else {
            self.double(f64::from(value));
            Ok(())
        }
    }

    fn double(&mut self, value: f64) {
        self.buf.put_u8(marker::DOUBLE);
        self.buf.put_f64(value);
    }

    /// Writes a string payload, by reference when it was written before.
    fn string(&mut self, s: &str) -> Result<(), EncodeError> {
        // The empty string is never sent by reference.
        if !s.is_empty() {
            if let Some(idx) = self.tables.strings.find_or_insert(s) {
                return encode_flagged(self.buf, idx, false);
            }
        }
        encode_flagged(self.buf, s.len(), true)?;
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn key(&mut self, key: &str) -> Result<(), EncodeError> {
        if key.is_empty() {
            return Err(EncodeError::EmptyKey);
        }
        self.string(key)
    }

    /// Writes a back-reference if the instance was written before, otherwise
    /// registers it. Returns `true` if a reference was written.
    fn reference(&mut self, id: usize) -> Result<bool, EncodeError> {
        match self.tables.objects.find_or_insert(&id) {
            Some(idx) => {
                encode_flagged(self.buf, idx, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn enter(&self, depth: usize) -> Result<usize, EncodeError> {
        let depth = depth + 1;
        if depth > self.config.max_depth {
            return Err(EncodeError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        Ok(depth)
    }

    fn array(&mut self, handle: &ArrayRef, depth: usize) -> Result<(), EncodeError> {
        let array = handle.borrow();
        let classification = array.classification();
        if self.config.force_object && !classification.is_dense() {
            self.buf.put_u8(marker::OBJECT);
            if self.reference(handle.id())? {
                return Ok(());
            }
            let depth = self.enter(depth)?;
            self.anonymous_traits()?;
            for (i, item) in array.dense().iter().enumerate() {
                self.key(&i.to_string())?;
                self.value(item, depth)?;
            }
            for (key, item) in array.assoc() {
                self.key(key)?;
                self.value(item, depth)?;
            }
            self.buf.put_u8(marker::EMPTY_STRING);
            return Ok(());
        }

        self.buf.put_u8(marker::ARRAY);
        if self.reference(handle.id())? {
            return Ok(());
        }
        let depth = self.enter(depth)?;
        encode_flagged(self.buf, classification.dense_count(), true)?;
        if let Classification::Associative { sparse, .. } = classification {
            for (key, item) in sparse {
                self.key(key)?;
                self.value(item, depth)?;
            }
        }
        self.buf.put_u8(marker::EMPTY_STRING);
        for item in array.dense() {
            self.value(item, depth)?;
        }
        Ok(())
    }

    fn object(&mut self, handle: &ObjectRef, depth: usize) -> Result<(), EncodeError> {
        self.buf.put_u8(marker::OBJECT);
        if self.reference(handle.id())? {
            return Ok(());
        }
        let depth = self.enter(depth)?;
        self.anonymous_traits()?;
        for (key, item) in handle.borrow().members() {
            self.key(key)?;
            self.value(item, depth)?;
        }
        self.buf.put_u8(marker::EMPTY_STRING);
        Ok(())
    }

    /// Writes the traits of an anonymous dynamic object: inline the first
    /// time, as a traits reference afterwards.
    fn anonymous_traits(&mut self) -> Result<(), EncodeError> {
        match self.tables.traits.find_or_insert("") {
            Some(idx) => {
                let idx = u32::try_from(idx)
                    .ok()
                    .filter(|i| *i <= u29::U29_MAX >> 2)
                    .ok_or(EncodeError::IntegerOverflow { value: idx as u64 })?;
                encode_u29(self.buf, (idx << 2) | 1)
            }
            None => {
                self.buf.put_u8(marker::ANONYMOUS_DYNAMIC_TRAITS);
                self.buf.put_u8(marker::EMPTY_STRING);
                Ok(())
            }
        }
    }
}
