//! Conversion between a host value model and the codec's [`Value`].
//!
//! The codec only understands [`Value`]. An adapter maps host values in and
//! out of it, and must do so identity-preservingly: a host composite that
//! appears twice becomes one shared `Value` handle, and a decoded handle that
//! appears twice becomes one host instance.

pub mod host;

use std::collections::HashMap;

use bytes::Bytes;

use crate::codec::classify::{Key, classify};
use crate::codec::{Decoder, Encoder};
use crate::error::{DecodeError, EncodeError};
use crate::types::{ArrayRef, ObjectRef, Value};

use self::host::{HostValue, RecordRef, TableRef};

/// Maps values of a host representation to and from [`Value`].
pub trait ValueAdapter {
    type Host;

    /// Converts a host value. Composites that are the same host instance
    /// must map to the same `Value` handle.
    fn to_core_value(&mut self, host: &Self::Host) -> Result<Value, EncodeError>;

    /// Converts a decoded value. Handles that are the same instance must map
    /// to the same host instance.
    fn from_core_value(&mut self, value: &Value) -> Self::Host;
}

/// [`ValueAdapter`] for [`HostValue`].
///
/// Identity memos live as long as the adapter, so one adapter should be
/// used per conversion.
#[derive(Debug, Default)]
pub struct HostAdapter {
    // Host handles are kept alive next to their conversion so an address is
    // never reused while the memo is in use.
    to_core: HashMap<usize, (HostValue, Value)>,
    from_core: HashMap<usize, (Value, HostValue)>,
}

impl HostAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_to_core(&mut self, table: &TableRef) -> Result<Value, EncodeError> {
        if let Some((_, value)) = self.to_core.get(&table.id()) {
            return Ok(value.clone());
        }
        let handle = ArrayRef::default();
        self.to_core.insert(
            table.id(),
            (HostValue::Table(table.clone()), Value::Array(handle.clone())),
        );

        let table = table.try_borrow().map_err(|_| EncodeError::Unrepresentable {
            reason: "table is mutably borrowed".into(),
        })?;
        let entries = table.entries();
        let dense = classify(entries).dense_count();
        for (i, (key, item)) in entries.iter().enumerate() {
            let item = self.to_core_value(item)?;
            if i < dense {
                handle.borrow_mut().push(item);
            } else {
                handle.borrow_mut().insert(key.to_string(), item);
            }
        }
        Ok(Value::Array(handle))
    }

    fn record_to_core(&mut self, record: &RecordRef) -> Result<Value, EncodeError> {
        if let Some((_, value)) = self.to_core.get(&record.id()) {
            return Ok(value.clone());
        }
        let handle = ObjectRef::default();
        self.to_core.insert(
            record.id(),
            (HostValue::Record(record.clone()), Value::Object(handle.clone())),
        );

        let record = record.try_borrow().map_err(|_| EncodeError::Unrepresentable {
            reason: "record is mutably borrowed".into(),
        })?;
        for (name, item) in record.fields() {
            let item = self.to_core_value(item)?;
            handle.borrow_mut().insert(name.clone(), item);
        }
        Ok(Value::Object(handle))
    }

    fn array_from_core(&mut self, array: &ArrayRef) -> HostValue {
        if let Some((_, host)) = self.from_core.get(&array.id()) {
            return host.clone();
        }
        let table = TableRef::default();
        self.from_core.insert(
            array.id(),
            (Value::Array(array.clone()), HostValue::Table(table.clone())),
        );

        let array = array.borrow();
        for (i, item) in array.dense().iter().enumerate() {
            let item = self.from_core_value(item);
            table.borrow_mut().set(Key::from(i), item);
        }
        for (key, item) in array.assoc() {
            let item = self.from_core_value(item);
            table.borrow_mut().set(Key::parse(key), item);
        }
        HostValue::Table(table)
    }

    fn object_from_core(&mut self, object: &ObjectRef) -> HostValue {
        if let Some((_, host)) = self.from_core.get(&object.id()) {
            return host.clone();
        }
        let record = RecordRef::default();
        self.from_core.insert(
            object.id(),
            (Value::Object(object.clone()), HostValue::Record(record.clone())),
        );

        for (name, item) in object.borrow().members() {
            let item = self.from_core_value(item);
            record.borrow_mut().set(name.clone(), item);
        }
        HostValue::Record(record)
    }
}

impl ValueAdapter for HostAdapter {
    type Host = HostValue;

    fn to_core_value(&mut self, host: &HostValue) -> Result<Value, EncodeError> {
        Ok(match host {
            HostValue::Null => Value::Null,
            HostValue::Bool(b) => Value::Boolean(*b),
            HostValue::Int(i) => match i32::try_from(*i) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Double(*i as f64),
            },
            HostValue::Float(f) => Value::Double(*f),
            HostValue::Str(s) => Value::String(s.clone()),
            HostValue::Table(t) => self.table_to_core(t)?,
            HostValue::Record(r) => self.record_to_core(r)?,
        })
    }

    fn from_core_value(&mut self, value: &Value) -> HostValue {
        match value {
            Value::Undefined | Value::Null => HostValue::Null,
            Value::Boolean(b) => HostValue::Bool(*b),
            Value::Integer(i) => HostValue::Int(i64::from(*i)),
            Value::Double(d) => HostValue::Float(*d),
            Value::String(s) => HostValue::Str(s.clone()),
            Value::Array(a) => self.array_from_core(a),
            Value::Object(o) => self.object_from_core(o),
        }
    }
}

/// Converts `host` with a fresh [`HostAdapter`] and encodes it.
pub fn encode_host(encoder: &Encoder, host: &HostValue) -> Result<Bytes, EncodeError> {
    let value = HostAdapter::new().to_core_value(host)?;
    encoder.encode(&value)
}

/// Decodes one value and converts it with a fresh [`HostAdapter`].
///
/// Returns the host value and the number of bytes consumed.
pub fn decode_host(decoder: &Decoder, bytes: &[u8]) -> Result<(HostValue, usize), DecodeError> {
    let (value, consumed) = decoder.decode(bytes)?;
    Ok((HostAdapter::new().from_core_value(&value), consumed))
}
