use crate::cnf::{GENERATED_ID_LENGTH, ID_CHARS};
use crate::sql::{Array, Number, Object, Value};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifying half of a [`Thing`](crate::sql::Thing).
///
/// Numeric ids are normalised: any [`Number`] whose value has no fractional
/// part collapses onto `Id::Number`, so `1`, `1.0` and `1.0000` all produce
/// the same `Id` and therefore the same encoded key (spec.md §3.1, §4.1, §8).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Id {
	Number(i64),
	String(String),
	Array(Vec<Value>),
	Object(Object),
	Generate(Gen),
}

/// A request to generate an id at document-processing time rather than at
/// target-resolution time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Gen {
	Rand,
}

impl Id {
	pub fn rand() -> Self {
		Id::String(nanoid::nanoid!(GENERATED_ID_LENGTH, &ID_CHARS))
	}

	pub fn to_raw(&self) -> String {
		match self {
			Id::Number(v) => v.to_string(),
			Id::String(v) => v.clone(),
			Id::Array(v) => Value::Array(v.clone()).to_string(),
			Id::Object(v) => Value::Object(v.clone()).to_string(),
			Id::Generate(Gen::Rand) => "rand()".to_string(),
		}
	}
}

impl fmt::Display for Id {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.to_raw())
	}
}

impl PartialEq for Id {
	fn eq(&self, other: &Self) -> bool {
		use Id::*;
		match (self, other) {
			(Number(a), Number(b)) => a == b,
			(String(a), String(b)) => a == b,
			(Array(a), Array(b)) => a == b,
			(Object(a), Object(b)) => a == b,
			_ => false,
		}
	}
}
impl Eq for Id {}

impl From<i64> for Id {
	fn from(v: i64) -> Self {
		Id::Number(v)
	}
}

impl From<&str> for Id {
	fn from(v: &str) -> Self {
		Id::String(v.to_owned())
	}
}

impl From<String> for Id {
	fn from(v: String) -> Self {
		Id::String(v)
	}
}

impl From<Array> for Id {
	fn from(v: Array) -> Self {
		Id::Array(v.0)
	}
}

impl From<Object> for Id {
	fn from(v: Object) -> Self {
		Id::Object(v)
	}
}

/// Numbers normalise onto integer ids whenever they carry no fractional part.
impl From<Number> for Id {
	fn from(v: Number) -> Self {
		let dec = v.as_decimal();
		if dec.fract().is_zero() {
			if let Some(i) = dec.trunc().to_i64() {
				return Id::Number(i);
			}
		}
		Id::String(dec.normalize().to_string())
	}
}

impl TryFrom<Value> for Id {
	type Error = crate::err::Error;
	fn try_from(v: Value) -> Result<Self, Self::Error> {
		match v {
			Value::Number(n) => Ok(n.into()),
			Value::Strand(s) => {
				// A numeric literal escaped into a string (`"1"`, `"1.0"`) still
				// normalises the same as the bare number, per spec.md §4.1.
				if let Ok(n) = s.parse::<rust_decimal::Decimal>() {
					Ok(Number::Decimal(n).into())
				} else {
					Ok(Id::String(s))
				}
			}
			Value::Array(a) => Ok(Id::Array(a.0)),
			Value::Object(o) => Ok(Id::Object(o)),
			Value::Thing(t) => Ok(t.id),
			v => Err(crate::err::Error::IdInvalid {
				value: format!("{v}"),
			}),
		}
	}
}
