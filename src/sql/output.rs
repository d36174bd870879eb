/// Selector for the shape of a mutation's return payload (spec.md Glossary
/// "Echo mode", §4.7.1 Yield).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Echo {
	None,
	Id,
	Diff,
	#[default]
	Full,
	After,
	Before,
	Both,
}

/// A single projected output column.
#[derive(Clone, Debug)]
pub enum Field {
	/// A non-aggregate projection: evaluated once per result; inside a
	/// GROUP bucket, evaluated against the bucket's first document
	/// (spec.md §4.6.5).
	Value {
		alias: String,
		expr: crate::sql::Expr,
	},
	/// An aggregate projection: receives the whole GROUP bucket.
	Aggregate {
		alias: String,
		func: AggFn,
		path: String,
	},
}

#[derive(Clone, Copy, Debug)]
pub enum AggFn {
	Count,
	Sum,
	Mean,
	Min,
	Max,
}

/// The projection list of a SELECT.
#[derive(Clone, Debug, Default)]
pub enum Fields {
	/// `SELECT * FROM ...`
	#[default]
	All,
	Some(Vec<Field>),
}
