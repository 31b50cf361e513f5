//! AMF3 value types.

use std::cell::{BorrowError, Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::codec::classify::{Classification, Key, classify};

/// Shared handle to a composite value.
///
/// Cloning the handle aliases the same instance; the codec uses the handle's
/// identity to detect values that appear more than once in a tree.
///
/// Handles are reference counted without atomics, so a `Value` tree is
/// neither `Send` nor `Sync` and stays on the thread that built or decoded it.
/// Encoders and decoders hold no shared state, so each thread can run its own.
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<amf3r::Value>();
/// ```
pub struct Shared<T>(Rc<RefCell<T>>);

/// Handle to an AMF3 array.
pub type ArrayRef = Shared<Array>;

/// Handle to an AMF3 anonymous object.
pub type ObjectRef = Shared<Object>;

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Borrows the instance, failing if it is currently mutably borrowed.
    pub fn try_borrow(&self) -> Result<Ref<'_, T>, BorrowError> {
        self.0.try_borrow()
    }

    /// Returns `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the instance, stable for as long as any handle is alive.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => inner.fmt(f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}

/// A value in the AMF3 data model.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    /// Signed 29-bit on the wire; values outside that range encode as doubles.
    Integer(i32),
    Double(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an f64 if it is an `Integer` or `Double`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(f64::from(*i)),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns `true` if both values are the same composite instance.
    ///
    /// Scalars never share identity.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// An AMF3 array: a dense part indexed `0..n` and an associative part.
///
/// The dense part only ever holds the contiguous run of integer keys starting
/// at zero. Everything else lives in the associative part, in insertion order.
#[derive(Clone, Default)]
pub struct Array {
    dense: Vec<Value>,
    assoc: Vec<(String, Value)>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty array with room for `dense` dense elements.
    pub fn with_capacity(dense: usize) -> Self {
        Self {
            dense: Vec::with_capacity(dense),
            assoc: Vec::new(),
        }
    }

    pub fn from_dense(items: Vec<Value>) -> Self {
        Self {
            dense: items,
            assoc: Vec::new(),
        }
    }

    /// Builds an array from keyed entries, splitting off the dense prefix.
    pub fn from_entries(entries: Vec<(Key, Value)>) -> Self {
        let dense_len = match classify(&entries) {
            Classification::Dense(n) => n,
            Classification::Associative { dense_prefix, .. } => dense_prefix,
        };
        let mut array = Self::new();
        for (i, (key, value)) in entries.into_iter().enumerate() {
            if i < dense_len {
                array.dense.push(value);
            } else {
                array.insert(key.to_string(), value);
            }
        }
        array
    }

    pub fn dense(&self) -> &[Value] {
        &self.dense
    }

    pub fn assoc(&self) -> &[(String, Value)] {
        &self.assoc
    }

    /// Appends to the dense part.
    ///
    /// An associative entry under the new index is replaced, and entries that
    /// continue the run afterwards move into the dense part.
    pub fn push(&mut self, value: Value) {
        if !self.assoc.is_empty() {
            let next = self.dense.len().to_string();
            self.assoc.retain(|(k, _)| *k != next);
        }
        self.dense.push(value);
        self.absorb();
    }

    /// Sets an entry, returning the previous value for `key`.
    ///
    /// A key naming the next dense index extends the dense part; one naming an
    /// existing dense index replaces that element. Other keys are associative.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.dense_slot(&key) {
            Some(i) if i < self.dense.len() => Some(std::mem::replace(&mut self.dense[i], value)),
            Some(_) => {
                self.dense.push(value);
                self.absorb();
                None
            }
            None => upsert(&mut self.assoc, key, value),
        }
    }

    /// Looks up an entry by key, dense elements included.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.dense_slot(key) {
            Some(i) => self.dense.get(i),
            None => lookup(&self.assoc, key),
        }
    }

    /// Dense index named by `key`, if it is within the dense part or just past it.
    fn dense_slot(&self, key: &str) -> Option<usize> {
        let i = usize::try_from(Key::parse(key).as_index()?).ok()?;
        (i <= self.dense.len()).then_some(i)
    }

    /// Moves associative entries that continue the dense run into it.
    fn absorb(&mut self) {
        while !self.assoc.is_empty() {
            let next = self.dense.len().to_string();
            match self.assoc.iter().position(|(k, _)| *k == next) {
                Some(pos) => {
                    let (_, value) = self.assoc.remove(pos);
                    self.dense.push(value);
                }
                None => break,
            }
        }
    }

    /// Looks up a dense element.
    pub fn index(&self, i: usize) -> Option<&Value> {
        self.dense.get(i)
    }

    /// Total number of entries, dense and associative.
    pub fn len(&self) -> usize {
        self.dense.len() + self.assoc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty() && self.assoc.is_empty()
    }

    pub fn is_dense(&self) -> bool {
        self.assoc.is_empty()
    }

    /// Dense count and, for associative arrays, the non-dense entries.
    pub fn classification(&self) -> Classification<'_, (String, Value)> {
        if self.assoc.is_empty() {
            Classification::Dense(self.dense.len())
        } else {
            Classification::Associative {
                dense_prefix: self.dense.len(),
                sparse: &self.assoc,
            }
        }
    }
}

/// An anonymous dynamic object: string keys in insertion order.
#[derive(Clone, Default)]
pub struct Object {
    members: Vec<(String, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a member, returning the previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        upsert(&mut self.members, key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.members, key)
    }

    pub fn members(&self) -> &[(String, Value)] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<(String, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut object = Self::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}

fn upsert(entries: &mut Vec<(String, Value)>, key: String, value: Value) -> Option<Value> {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, slot)) => Some(std::mem::replace(slot, value)),
        None => {
            entries.push((key, value));
            None
        }
    }
}

fn lookup<'a>(entries: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

// -- Equality --
//
// Structural, with member order ignored. Pairs of composites already under
// comparison are assumed equal, so cyclic structures terminate.

type Assumed = HashSet<(usize, usize)>;

fn values_eq(a: &Value, b: &Value, assumed: &mut Assumed) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Double(x), Value::Double(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !assumed.insert((x.id(), y.id())) {
                return true;
            }
            arrays_eq(&x.borrow(), &y.borrow(), assumed)
        }
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !assumed.insert((x.id(), y.id())) {
                return true;
            }
            entries_eq(&x.borrow().members, &y.borrow().members, assumed)
        }
        _ => false,
    }
}

fn arrays_eq(a: &Array, b: &Array, assumed: &mut Assumed) -> bool {
    a.dense.len() == b.dense.len()
        && a
            .dense
            .iter()
            .zip(&b.dense)
            .all(|(x, y)| values_eq(x, y, assumed))
        && entries_eq(&a.assoc, &b.assoc, assumed)
}

fn entries_eq(a: &[(String, Value)], b: &[(String, Value)], assumed: &mut Assumed) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, x)| match lookup(b, key) {
            Some(y) => values_eq(x, y, assumed),
            None => false,
        })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_eq(self, other, &mut Assumed::new())
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        arrays_eq(self, other, &mut Assumed::new())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        entries_eq(&self.members, &other.members, &mut Assumed::new())
    }
}

// -- Formatting --

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, stack: &mut Vec<usize>) -> fmt::Result {
    match value {
        Value::Undefined => write!(f, "undefined"),
        Value::Null => write!(f, "null"),
        Value::Boolean(b) => write!(f, "{b}"),
        Value::Integer(i) => write!(f, "{i}"),
        Value::Double(d) => write!(f, "{d:?}"),
        Value::String(s) => write!(f, "{s:?}"),
        Value::Array(a) => {
            if stack.contains(&a.id()) {
                return write!(f, "<cycle>");
            }
            stack.push(a.id());
            let result = write_array(f, &a.borrow(), stack);
            stack.pop();
            result
        }
        Value::Object(o) => {
            if stack.contains(&o.id()) {
                return write!(f, "<cycle>");
            }
            stack.push(o.id());
            let result = write_members(f, &o.borrow().members, stack);
            stack.pop();
            result
        }
    }
}

fn write_array(f: &mut fmt::Formatter<'_>, array: &Array, stack: &mut Vec<usize>) -> fmt::Result {
    write!(f, "[")?;
    let mut first = true;
    for item in &array.dense {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write_value(f, item, stack)?;
    }
    for (key, item) in &array.assoc {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{key:?}: ")?;
        write_value(f, item, stack)?;
    }
    write!(f, "]")
}

fn write_members(
    f: &mut fmt::Formatter<'_>,
    members: &[(String, Value)],
    stack: &mut Vec<usize>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (key, item)) in members.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{key:?}: ")?;
        write_value(f, item, stack)?;
    }
    write!(f, "}}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_array(f, self, &mut Vec::new())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_members(f, &self.members, &mut Vec::new())
    }
}

// -- Convenience conversions --

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Shared::new(Array::from_dense(items)))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(Shared::new(a))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(Shared::new(o))
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Self::Array(a)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}
