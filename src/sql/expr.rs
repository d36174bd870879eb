use crate::err::Error;
use crate::sql::{Thing, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The document-local context an [`Expr`] evaluates against: the variables
/// SurrealQL exposes inside `VALUE`/`ASSERT`/`WHEN`/`PERMISSION` clauses.
/// Expression evaluation itself is an external collaborator (spec.md §1);
/// this is the interface the core hands it.
#[derive(Clone, Debug, Default)]
pub struct DocContext {
	/// `$before` — the document as it was before this statement.
	pub before: Value,
	/// `$after` — the document as it stands after merging/field computation.
	pub after: Value,
	/// `$this` / `$value` — the field currently being processed, if any.
	pub value: Option<Value>,
	/// `$this` when evaluating at the whole-document level (the record id).
	pub this: Option<Thing>,
	/// `$method` — `CREATE` | `UPDATE` | `DELETE`.
	pub method: Option<&'static str>,
	/// `$parent` — the record id of the document that triggered this one
	/// via an event, if any (spec.md §4.8).
	pub parent: Option<Thing>,
	/// `$origin` — the outermost record id that started the recursion chain.
	pub origin: Option<Thing>,
	/// Session and statement-local bound variables (`LET`, query params).
	pub vars: BTreeMap<String, Value>,
}

impl DocContext {
	pub fn var(&self, name: &str) -> Value {
		match name {
			"before" => self.before.clone(),
			"after" => self.after.clone(),
			"value" => self.value.clone().unwrap_or(Value::None),
			"this" => self.this.clone().map(Value::Thing).unwrap_or(Value::None),
			"parent" => self.parent.clone().map(Value::Thing).unwrap_or(Value::None),
			"origin" => self.origin.clone().map(Value::Thing).unwrap_or(Value::None),
			"method" => self.method.map(|m| Value::Strand(m.to_string())).unwrap_or(Value::None),
			other => self.vars.get(other).cloned().unwrap_or(Value::None),
		}
	}
}

/// A boxed pure evaluator over a [`DocContext`].
///
/// SurrealQL's real expression grammar (functions, idiom paths, operators)
/// is out of scope here; `Expr` models the *interface* the core consumes:
/// something that reduces to a `Value` given a document context. The two
/// concrete constructors below (`Expr::value` and `Expr::closure`) are what
/// the statement layer, and tests that stand in for a parser, use.
#[derive(Clone)]
pub enum Expr {
	/// A literal value, independent of the document.
	Literal(Value),
	/// A field path read directly off `$after` (shorthand for the common
	/// case of comparing a column without a full expression language).
	Field(String),
	/// An arbitrary evaluator, e.g. standing in for a parsed `ASSERT`/`WHEN`
	/// clause body.
	Closure(Arc<dyn Fn(&DocContext) -> Result<Value, Error> + Send + Sync>),
}

impl fmt::Debug for Expr {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Expr::Literal(v) => write!(f, "Literal({v})"),
			Expr::Field(p) => write!(f, "Field({p})"),
			Expr::Closure(_) => write!(f, "Closure(..)"),
		}
	}
}

impl Expr {
	pub fn value(v: impl Into<Value>) -> Self {
		Expr::Literal(v.into())
	}

	pub fn field(name: impl Into<String>) -> Self {
		Expr::Field(name.into())
	}

	pub fn closure(
		f: impl Fn(&DocContext) -> Result<Value, Error> + Send + Sync + 'static,
	) -> Self {
		Expr::Closure(Arc::new(f))
	}

	pub fn compute(&self, ctx: &DocContext) -> Result<Value, Error> {
		match self {
			Expr::Literal(v) => Ok(v.clone()),
			Expr::Field(path) => Ok(ctx.after.get(path)),
			Expr::Closure(f) => f(ctx),
		}
	}
}
