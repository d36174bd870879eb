use crate::sql::{Number, Thing};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A B-tree backed object so that field iteration order (used by index
/// column ordering and projection output) is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Object(pub BTreeMap<String, Value>);

/// An ordered list of values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Array(pub Vec<Value>);

impl FromIterator<Value> for Array {
	fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
		Array(iter.into_iter().collect())
	}
}

impl From<Vec<Value>> for Array {
	fn from(v: Vec<Value>) -> Self {
		Array(v)
	}
}

impl From<BTreeMap<String, Value>> for Object {
	fn from(v: BTreeMap<String, Value>) -> Self {
		Object(v)
	}
}

/// An internal tagged dynamic value (spec.md §9 Design Notes): the shape
/// every document `data` section, expression literal, and sub-query result
/// is represented in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Value {
	#[default]
	None,
	Null,
	Bool(bool),
	Number(Number),
	Strand(String),
	Bytes(Vec<u8>),
	Datetime(DateTime<Utc>),
	Array(Array),
	Object(Object),
	Thing(Thing),
}

impl Value {
	pub fn is_none(&self) -> bool {
		matches!(self, Value::None)
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn is_nullish(&self) -> bool {
		self.is_none() || self.is_null()
	}

	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Bool(b) => *b,
			Value::Number(n) => n.as_f64() != 0.0,
			Value::Strand(s) => !s.is_empty(),
			Value::Array(a) => !a.0.is_empty(),
			Value::Object(o) => !o.0.is_empty(),
			Value::None | Value::Null => false,
			_ => true,
		}
	}

	pub fn as_thing(&self) -> Option<&Thing> {
		match self {
			Value::Thing(t) => Some(t),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(o) => Some(o),
			_ => None,
		}
	}

	pub fn as_object_mut(&mut self) -> Option<&mut Object> {
		match self {
			Value::Object(o) => Some(o),
			_ => None,
		}
	}

	pub fn kindof(&self) -> &'static str {
		match self {
			Value::None => "none",
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Number(_) => "number",
			Value::Strand(_) => "string",
			Value::Bytes(_) => "bytes",
			Value::Datetime(_) => "datetime",
			Value::Array(_) => "array",
			Value::Object(_) => "object",
			Value::Thing(_) => "record",
		}
	}

	/// Read a single top-level field, `None`/`Null` if absent.
	pub fn get(&self, key: &str) -> Value {
		match self {
			Value::Object(o) => o.0.get(key).cloned().unwrap_or(Value::None),
			_ => Value::None,
		}
	}

	/// Set a single top-level field, creating the object if needed.
	pub fn put(&mut self, key: &str, val: Value) {
		if !matches!(self, Value::Object(_)) {
			*self = Value::Object(Object::default());
		}
		if let Value::Object(o) = self {
			o.0.insert(key.to_string(), val);
		}
	}

	/// Remove a single top-level field.
	pub fn cut(&mut self, key: &str) {
		if let Value::Object(o) = self {
			o.0.remove(key);
		}
	}

	/// Deep-merge `other` into `self`, `other`'s values taking precedence
	/// (spec.md §4.7.1 `MergeExpression`).
	pub fn merge(&mut self, other: Value) {
		match (self, other) {
			(Value::Object(a), Value::Object(b)) => {
				for (k, v) in b.0 {
					match a.0.get_mut(&k) {
						Some(existing) if matches!((&*existing, &v), (Value::Object(_), Value::Object(_))) => {
							existing.merge(v);
						}
						_ => {
							a.0.insert(k, v);
						}
					}
				}
			}
			(slf, other) => *slf = other,
		}
	}

	/// Append a value to an array field (spec.md `+=`), creating the array
	/// if the field was absent.
	pub fn append(&mut self, key: &str, val: Value) {
		let entry = match self {
			Value::Object(o) => o.0.entry(key.to_string()).or_insert_with(|| Value::Array(Array::default())),
			_ => return,
		};
		match entry {
			Value::Array(a) => a.0.push(val),
			other => {
				let existing = std::mem::take(other);
				*other = Value::Array(Array(vec![existing, val]));
			}
		}
	}

	/// Remove a value from an array field (spec.md `-=`).
	pub fn remove_from(&mut self, key: &str, val: &Value) {
		if let Value::Object(o) = self {
			if let Some(Value::Array(a)) = o.0.get_mut(key) {
				a.0.retain(|v| v != val);
			}
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Value::None | Value::Null => write!(f, "NULL"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Number(v) => write!(f, "{v}"),
			Value::Strand(v) => write!(f, "{v}"),
			Value::Bytes(v) => write!(f, "{}b", v.len()),
			Value::Datetime(v) => write!(f, "{v}"),
			Value::Array(v) => {
				write!(f, "[")?;
				for (i, x) in v.0.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{x}")?;
				}
				write!(f, "]")
			}
			Value::Object(v) => {
				write!(f, "{{")?;
				for (i, (k, x)) in v.0.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{k}: {x}")?;
				}
				write!(f, "}}")
			}
			Value::Thing(v) => write!(f, "{v}"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}
impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Number(Number::Int(v))
	}
}
impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Number(Number::Float(v))
	}
}
impl From<Number> for Value {
	fn from(v: Number) -> Self {
		Value::Number(v)
	}
}
impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Strand(v.to_owned())
	}
}
impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Strand(v)
	}
}
impl From<Thing> for Value {
	fn from(v: Thing) -> Self {
		Value::Thing(v)
	}
}
impl From<Array> for Value {
	fn from(v: Array) -> Self {
		Value::Array(v)
	}
}
impl From<Object> for Value {
	fn from(v: Object) -> Self {
		Value::Object(v)
	}
}
impl From<Vec<Value>> for Value {
	fn from(v: Vec<Value>) -> Self {
		Value::Array(Array(v))
	}
}

/// A domain comparator used by ORDER BY: numbers compare numerically,
/// strings lexicographically; mixed types compare consistently but the
/// exact cross-type order is unspecified (spec.md §4.6.5).
pub fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
	use std::cmp::Ordering;
	use Value::*;
	match (a, b) {
		(Number(a), Number(b)) => a.cmp(b),
		(Strand(a), Strand(b)) => a.cmp(b),
		(Bool(a), Bool(b)) => a.cmp(b),
		(Datetime(a), Datetime(b)) => a.cmp(b),
		(None | Null, None | Null) => Ordering::Equal,
		(None | Null, _) => Ordering::Less,
		(_, None | Null) => Ordering::Greater,
		_ => rank(a).cmp(&rank(b)),
	}
}

fn rank(v: &Value) -> u8 {
	match v {
		Value::None => 0,
		Value::Null => 1,
		Value::Bool(_) => 2,
		Value::Number(_) => 3,
		Value::Strand(_) => 4,
		Value::Bytes(_) => 5,
		Value::Datetime(_) => 6,
		Value::Array(_) => 7,
		Value::Object(_) => 8,
		Value::Thing(_) => 9,
	}
}
