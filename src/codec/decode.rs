//! AMF3 decoding: bytes → `Value`.

use std::rc::Rc;

use bytes::Buf;

use super::encode::DEFAULT_MAX_DEPTH;
use super::marker;
use super::reference::RefList;
use super::u29::{decode_u29, u29_to_int};
use crate::error::{DecodeError, RefTable};
use crate::types::{Array, ArrayRef, ObjectRef, Value};

/// Decodes values with a given configuration.
///
/// Every call starts from empty reference tables. A failed call returns no
/// value at all.
#[derive(Debug, Clone)]
pub struct Decoder {
    max_depth: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the maximum nesting depth of arrays and objects.
    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Decodes one value from the start of `bytes`.
    ///
    /// Returns the value and the number of bytes it occupied; trailing bytes
    /// are left for the caller.
    pub fn decode(&self, bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
        self.decode_at(bytes, 0)
    }

    /// Decodes one value starting at `pos`, returning the bytes consumed from `pos`.
    pub fn decode_at(&self, bytes: &[u8], pos: usize) -> Result<(Value, usize), DecodeError> {
        let mut session = Session {
            config: self,
            input: bytes,
            pos,
            strings: RefList::new(RefTable::String),
            objects: RefList::new(RefTable::Object),
            traits: RefList::new(RefTable::Traits),
        };
        match session.value(0) {
            Ok(value) => {
                let consumed = session.pos - pos;
                tracing::trace!(consumed, "decoded AMF3 value");
                Ok((value, consumed))
            }
            Err(e) => {
                tracing::debug!(error = %e, offset = e.offset(), "AMF3 decode failed");
                Err(e)
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes one value with the default configuration.
pub fn decode(bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
    Decoder::new().decode(bytes)
}

/// Object traits: sealed member names and whether dynamic members follow.
#[derive(Debug)]
struct Traits {
    sealed: Vec<String>,
    dynamic: bool,
}

/// State of a single decode call.
struct Session<'a> {
    config: &'a Decoder,
    input: &'a [u8],
    pos: usize,
    strings: RefList<String>,
    objects: RefList<Value>,
    traits: RefList<Rc<Traits>>,
}

impl<'a> Session<'a> {
    fn remaining(&self) -> usize {
        self.input.len().saturating_sub(self.pos)
    }

    fn ensure_remaining(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.remaining();
        if remaining < needed {
            Err(DecodeError::TruncatedStream {
                needed,
                remaining,
                offset: self.pos,
            })
        } else {
            Ok(())
        }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure_remaining(1)?;
        let b = self.input[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_u29(&mut self) -> Result<u32, DecodeError> {
        let (value, len) = decode_u29(self.input, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let mut raw = self.read_slice(8)?;
        Ok(raw.get_f64())
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure_remaining(len)?;
        let slice = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn enter(&self, depth: usize, offset: usize) -> Result<usize, DecodeError> {
        let depth = depth + 1;
        if depth > self.config.max_depth {
            return Err(DecodeError::DepthExceeded {
                limit: self.config.max_depth,
                offset,
            });
        }
        Ok(depth)
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let offset = self.pos;
        let m = self.read_u8()?;
        match m {
            marker::UNDEFINED => Ok(Value::Undefined),
            marker::NULL => Ok(Value::Null),
            marker::FALSE => Ok(Value::Boolean(false)),
            marker::TRUE => Ok(Value::Boolean(true)),
            marker::INTEGER => Ok(Value::Integer(u29_to_int(self.read_u29()?))),
            marker::DOUBLE => Ok(Value::Double(self.read_f64()?)),
            marker::STRING => Ok(Value::String(self.string()?)),
            marker::ARRAY => self.array(depth),
            marker::OBJECT => self.object(depth),
            _ => Err(DecodeError::UnknownTypeMarker { marker: m, offset }),
        }
    }

    /// Reads a string payload: inline bytes or a string-table reference.
    fn string(&mut self) -> Result<String, DecodeError> {
        let offset = self.pos;
        let lead = self.read_u29()?;
        let n = (lead >> 1) as usize;
        if lead & 1 == 0 {
            return self.strings.get(n, offset).cloned();
        }
        let start = self.pos;
        let raw = self.read_slice(n)?;
        let s = std::str::from_utf8(raw)
            .map_err(|_| DecodeError::InvalidUtf8 { offset: start })?
            .to_owned();
        // The empty string is never sent by reference.
        if !s.is_empty() {
            self.strings.push(s.clone());
        }
        Ok(s)
    }

    fn array(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let offset = self.pos;
        let lead = self.read_u29()?;
        if lead & 1 == 0 {
            return self.objects.get((lead >> 1) as usize, offset).cloned();
        }
        let depth = self.enter(depth, offset)?;
        let dense_len = (lead >> 1) as usize;

        // Registered before its children so that they can refer back to it.
        let handle = ArrayRef::new(Array::with_capacity(dense_len.min(self.remaining())));
        self.objects.push(Value::Array(handle.clone()));

        let mut assoc = Vec::new();
        loop {
            let key = self.string()?;
            if key.is_empty() {
                break;
            }
            let item = self.value(depth)?;
            assoc.push((key, item));
        }
        for _ in 0..dense_len {
            let item = self.value(depth)?;
            handle.borrow_mut().push(item);
        }
        // Keys are placed once the dense part is known, so an index key that
        // continues the run joins it.
        {
            let mut array = handle.borrow_mut();
            for (key, item) in assoc {
                array.insert(key, item);
            }
        }
        Ok(Value::Array(handle))
    }

    fn object(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let offset = self.pos;
        let lead = self.read_u29()?;
        if lead & 1 == 0 {
            return self.objects.get((lead >> 1) as usize, offset).cloned();
        }
        let traits = self.traits(lead, offset)?;
        let depth = self.enter(depth, offset)?;

        let handle = ObjectRef::default();
        self.objects.push(Value::Object(handle.clone()));

        for name in &traits.sealed {
            let item = self.value(depth)?;
            handle.borrow_mut().insert(name.clone(), item);
        }
        if traits.dynamic {
            loop {
                let key = self.string()?;
                if key.is_empty() {
                    break;
                }
                let item = self.value(depth)?;
                handle.borrow_mut().insert(key, item);
            }
        }
        Ok(Value::Object(handle))
    }

    fn traits(&mut self, lead: u32, offset: usize) -> Result<Rc<Traits>, DecodeError> {
        if lead & marker::TRAITS_INLINE == 0 {
            return self.traits.get((lead >> 2) as usize, offset).cloned();
        }
        if lead & marker::TRAITS_EXTERNALIZABLE != 0 {
            return Err(DecodeError::UnsupportedTraits {
                reason: "externalizable object".into(),
                offset,
            });
        }
        let sealed_count = (lead >> 4) as usize;
        let class_name = self.string()?;
        if !class_name.is_empty() {
            return Err(DecodeError::UnsupportedTraits {
                reason: format!("typed object of class '{class_name}'"),
                offset,
            });
        }
        // Each member name takes at least one byte.
        self.ensure_remaining(sealed_count)?;

        let mut sealed = Vec::with_capacity(sealed_count);
        for _ in 0..sealed_count {
            let name_offset = self.pos;
            let name = self.string()?;
            if name.is_empty() {
                return Err(DecodeError::UnsupportedTraits {
                    reason: "empty sealed member name".into(),
                    offset: name_offset,
                });
            }
            sealed.push(name);
        }
        let traits = Rc::new(Traits {
            sealed,
            dynamic: lead & marker::TRAITS_DYNAMIC != 0,
        });
        self.traits.push(Rc::clone(&traits));
        Ok(traits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::classify::Key;
    use crate::codec::encode::encode;
    use crate::types::Object;

    /// Encode then decode a value and check that every byte was consumed.
    fn round_trip(value: &Value) -> Value {
        let bytes = encode(value).expect("encode failed");
        let (decoded, consumed) = decode(&bytes).expect("decode failed");
        assert_eq!(consumed, bytes.len());
        decoded
    }

    #[test]
    fn round_trip_scalars() {
        for value in [
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Integer(0),
            Value::Integer(1234),
            Value::Integer(-1),
            Value::Integer(crate::codec::u29::INT_MAX),
            Value::Integer(crate::codec::u29::INT_MIN),
            Value::Double(-4567.89),
            Value::Double(f64::INFINITY),
            Value::from("héllo wörld"),
            Value::from(""),
        ] {
            assert_eq!(round_trip(&value), value, "failed for {value}");
        }
    }

    #[test]
    fn round_trip_preserves_double_bits() {
        for bits in [0x7FF8_0000_0000_0001u64, (-0.0f64).to_bits()] {
            match round_trip(&Value::Double(f64::from_bits(bits))) {
                Value::Double(d) => assert_eq!(d.to_bits(), bits),
                other => panic!("expected double, got {other}"),
            }
        }
    }

    #[test]
    fn promoted_integer_decodes_as_double() {
        let value = Value::Integer(crate::codec::u29::INT_MAX + 1);
        assert_eq!(round_trip(&value), Value::Double(268_435_456.0));
    }

    #[test]
    fn decode_associative_array() {
        let bytes = [
            0x09, 0x03, 0x03, b'2', 0x04, 0x84, 0x2B, 0x03, b'3', 0x04, 0x85, 0x1A, 0x01, 0x04,
            0x83, 0x3C,
        ];
        let (value, consumed) = decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        let array = value.as_array().unwrap().borrow();
        assert_eq!(array.dense(), &[Value::Integer(444)]);
        assert_eq!(array.get("2"), Some(&Value::Integer(555)));
        assert_eq!(array.get("3"), Some(&Value::Integer(666)));
    }

    #[test]
    fn associative_index_keys_join_the_dense_part() {
        let (value, consumed) = decode(&[0x09, 0x01, 0x03, b'0', 0x04, 0x01, 0x01]).unwrap();
        assert_eq!(consumed, 7);
        {
            let array = value.as_array().unwrap().borrow();
            assert_eq!(array.dense(), &[Value::Integer(1)]);
            assert!(array.assoc().is_empty());
        }
        assert_eq!(&encode(&value).unwrap()[..], &[0x09, 0x03, 0x01, 0x04, 0x01]);

        // "1" continues a dense part of one element.
        let bytes = [0x09, 0x03, 0x03, b'1', 0x04, 0x02, 0x01, 0x04, 0x01];
        let (value, _) = decode(&bytes).unwrap();
        let array = value.as_array().unwrap().borrow();
        assert_eq!(array.dense(), &[Value::Integer(1), Value::Integer(2)]);
        assert!(array.is_dense());
    }

    #[test]
    fn four_byte_dense_count_round_trips() {
        let count = 1 << 20;
        let value = Value::from(vec![Value::Null; count]);
        let bytes = encode(&value).unwrap();
        // (2^20 << 1) | 1 needs all four U29 bytes.
        assert_eq!(&bytes[..6], &[0x09, 0x80, 0xC0, 0x80, 0x01, 0x01]);
        assert_eq!(bytes.len(), 6 + count);

        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        let array = decoded.as_array().unwrap().borrow();
        assert_eq!(array.dense().len(), count);
        assert!(array.is_dense());
    }

    #[test]
    fn round_trip_keeps_classification() {
        let sparse = Value::from(Array::from_entries(vec![
            (Key::Index(0), Value::Integer(1)),
            (Key::Name("name".into()), Value::from("x")),
        ]));
        let decoded = round_trip(&sparse);
        let array = decoded.as_array().unwrap().borrow();
        assert_eq!(array.dense().len(), 1);
        assert_eq!(array.assoc().len(), 1);
        assert_eq!(decoded, sparse);
    }

    #[test]
    fn round_trip_strings_by_reference() {
        let value = Value::from(vec![
            Value::from("again"),
            Value::from("again"),
            Value::from(""),
            Value::from(""),
        ]);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn aliasing_is_preserved() {
        let shared = Value::from(vec![Value::from("I'm in a reference object")]);
        let mut root = Object::new();
        root.insert("a", shared.clone());
        root.insert("b", shared);

        let decoded = round_trip(&Value::from(root));
        let root = decoded.as_object().unwrap().borrow();
        let a = root.get("a").unwrap();
        let b = root.get("b").unwrap();
        assert!(a.same_identity(b));

        a.as_array().unwrap().borrow_mut().push(Value::Integer(7));
        assert_eq!(b.as_array().unwrap().borrow().len(), 2);
    }

    #[test]
    fn self_referencing_array() {
        let (value, consumed) = decode(&[0x09, 0x03, 0x01, 0x09, 0x00]).unwrap();
        assert_eq!(consumed, 5);
        let inner = value.as_array().unwrap().borrow().index(0).cloned().unwrap();
        assert!(inner.same_identity(&value));
    }

    #[test]
    fn object_cycle_round_trips() {
        let parent = ObjectRef::default();
        let child = ObjectRef::default();
        child.borrow_mut().insert("parent", Value::Object(parent.clone()));
        parent.borrow_mut().insert("child", Value::Object(child));

        let decoded = round_trip(&Value::Object(parent.clone()));
        assert_eq!(decoded, Value::Object(parent));

        let back = decoded
            .as_object()
            .unwrap()
            .borrow()
            .get("child")
            .unwrap()
            .as_object()
            .unwrap()
            .borrow()
            .get("parent")
            .cloned()
            .unwrap();
        assert!(back.same_identity(&decoded));
    }

    #[test]
    fn sealed_traits_and_traits_reference() {
        let bytes = [
            0x09, 0x05, 0x01, // dense array of two
            0x0A, 0x2B, 0x01, // 2 sealed, dynamic, anonymous
            0x03, b'x', 0x03, b'y', // sealed names
            0x04, 0x01, 0x04, 0x02, // x = 1, y = 2
            0x03, b'z', 0x04, 0x03, 0x01, // z = 3, end
            0x0A, 0x01, // traits #0
            0x04, 0x05, 0x04, 0x06, // x = 5, y = 6
            0x01, // end
        ];
        let (value, consumed) = decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());

        let array = value.as_array().unwrap().borrow();
        let first = array.index(0).unwrap().as_object().unwrap().borrow();
        assert_eq!(first.get("x"), Some(&Value::Integer(1)));
        assert_eq!(first.get("y"), Some(&Value::Integer(2)));
        assert_eq!(first.get("z"), Some(&Value::Integer(3)));
        let second = array.index(1).unwrap().as_object().unwrap().borrow();
        assert_eq!(second.get("x"), Some(&Value::Integer(5)));
        assert_eq!(second.get("y"), Some(&Value::Integer(6)));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn trailing_bytes_are_not_consumed() {
        assert_eq!(decode(&[0x01, 0xFF, 0xFF]), Ok((Value::Null, 1)));
    }

    #[test]
    fn decode_at_offset() {
        let bytes = [0xFF, 0x04, 0x89, 0x52];
        assert_eq!(
            Decoder::new().decode_at(&bytes, 1),
            Ok((Value::Integer(1234), 3))
        );
        assert_eq!(
            Decoder::new().decode_at(&bytes, 5),
            Err(DecodeError::TruncatedStream {
                needed: 1,
                remaining: 0,
                offset: 5,
            })
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(
            decode(&[]),
            Err(DecodeError::TruncatedStream {
                needed: 1,
                remaining: 0,
                offset: 0,
            })
        );
    }

    #[test]
    fn unknown_marker() {
        assert_eq!(
            decode(&[0x0D]),
            Err(DecodeError::UnknownTypeMarker {
                marker: 0x0D,
                offset: 0,
            })
        );
        // Extension types are outside the supported set.
        for m in [marker::XML_DOC, marker::DATE, marker::XML, marker::BYTE_ARRAY] {
            assert_eq!(
                decode(&[m, 0x01]),
                Err(DecodeError::UnknownTypeMarker { marker: m, offset: 0 })
            );
        }
    }

    #[test]
    fn truncated_integer() {
        assert_eq!(
            decode(&[0x04, 0x81]),
            Err(DecodeError::MalformedInteger { offset: 1 })
        );
    }

    #[test]
    fn truncated_double() {
        assert_eq!(
            decode(&[0x05, 0x00, 0x00]),
            Err(DecodeError::TruncatedStream {
                needed: 8,
                remaining: 2,
                offset: 1,
            })
        );
    }

    #[test]
    fn truncated_string() {
        assert_eq!(
            decode(&[0x06, 0x07, b'a']),
            Err(DecodeError::TruncatedStream {
                needed: 3,
                remaining: 1,
                offset: 2,
            })
        );
    }

    #[test]
    fn truncated_dense_part() {
        let err = decode(&[0x09, 0x07, 0x01, 0x04, 0x01]).unwrap_err();
        assert!(err.is_truncation());
        assert_eq!(err.offset(), 5);
    }

    #[test]
    fn invalid_utf8() {
        assert_eq!(
            decode(&[0x06, 0x03, 0xFF]),
            Err(DecodeError::InvalidUtf8 { offset: 2 })
        );
    }

    #[test]
    fn invalid_references() {
        assert_eq!(
            decode(&[0x06, 0x00]),
            Err(DecodeError::InvalidReference {
                table: RefTable::String,
                index: 0,
                len: 0,
                offset: 1,
            })
        );
        assert_eq!(
            decode(&[0x09, 0x02]),
            Err(DecodeError::InvalidReference {
                table: RefTable::Object,
                index: 1,
                len: 0,
                offset: 1,
            })
        );
        assert_eq!(
            decode(&[0x0A, 0x05]),
            Err(DecodeError::InvalidReference {
                table: RefTable::Traits,
                index: 1,
                len: 0,
                offset: 1,
            })
        );
    }

    #[test]
    fn unsupported_traits() {
        let err = decode(&[0x0A, 0x07, 0x01]).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedTraits { offset: 1, .. }));

        let err = decode(&[0x0A, 0x0B, 0x07, b'F', b'o', b'o', 0x01]).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedTraits { offset: 1, .. }));
    }

    #[test]
    fn depth_limit() {
        let bytes = [0x09, 0x03, 0x01, 0x09, 0x03, 0x01, 0x09, 0x01, 0x01];
        assert_eq!(
            Decoder::new().max_depth(2).decode(&bytes),
            Err(DecodeError::DepthExceeded {
                limit: 2,
                offset: 7,
            })
        );
        assert!(Decoder::new().max_depth(3).decode(&bytes).is_ok());
    }

    #[test]
    fn huge_count_does_not_preallocate() {
        // Dense count 2^27 - 1 with nothing behind it.
        let err = decode(&[0x09, 0xBF, 0xFF, 0xFF, 0xFF, 0x01]).unwrap_err();
        assert!(err.is_truncation());
    }
}
