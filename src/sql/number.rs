use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A numeric value. Integers, floats and decimals are distinct variants but
/// compare and hash by their numeric value so that `1`, `1.0` and `1.0000`
/// are considered the same number (spec.md §3.1, §8).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Number {
	Int(i64),
	Float(f64),
	Decimal(Decimal),
}

impl Default for Number {
	fn default() -> Self {
		Number::Int(0)
	}
}

impl From<i64> for Number {
	fn from(v: i64) -> Self {
		Number::Int(v)
	}
}

impl From<i32> for Number {
	fn from(v: i32) -> Self {
		Number::Int(v as i64)
	}
}

impl From<f64> for Number {
	fn from(v: f64) -> Self {
		Number::Float(v)
	}
}

impl From<Decimal> for Number {
	fn from(v: Decimal) -> Self {
		Number::Decimal(v)
	}
}

impl Number {
	pub fn as_decimal(&self) -> Decimal {
		match self {
			Number::Int(v) => Decimal::from(*v),
			Number::Float(v) => Decimal::try_from(*v).unwrap_or_default(),
			Number::Decimal(v) => *v,
		}
	}

	pub fn as_f64(&self) -> f64 {
		match self {
			Number::Int(v) => *v as f64,
			Number::Float(v) => *v,
			Number::Decimal(v) => v.try_into().unwrap_or_default(),
		}
	}

	pub fn is_integer(&self) -> bool {
		matches!(self, Number::Int(_))
	}
}

impl fmt::Display for Number {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Number::Int(v) => write!(f, "{v}"),
			Number::Float(v) => write!(f, "{v}"),
			Number::Decimal(v) => write!(f, "{v}"),
		}
	}
}

impl PartialEq for Number {
	fn eq(&self, other: &Self) -> bool {
		self.as_decimal() == other.as_decimal()
	}
}
impl Eq for Number {}

impl PartialOrd for Number {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Number {
	fn cmp(&self, other: &Self) -> Ordering {
		self.as_decimal().cmp(&other.as_decimal())
	}
}

impl std::hash::Hash for Number {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.as_decimal().hash(state)
	}
}

impl std::ops::Add for Number {
	type Output = Number;
	fn add(self, rhs: Self) -> Self::Output {
		Number::Decimal(self.as_decimal() + rhs.as_decimal())
	}
}

impl std::ops::Sub for Number {
	type Output = Number;
	fn sub(self, rhs: Self) -> Self::Output {
		Number::Decimal(self.as_decimal() - rhs.as_decimal())
	}
}
