use crate::sql::output::{Echo, Fields};
use crate::sql::schema::{DefineEventStatement, DefineFieldStatement, DefineIndexStatement, DefineTableStatement};
use crate::sql::{Array, Data, Expr, Id, Number, Thing};
use std::time::Duration;

/// A full parsed query: a sequence of statements in source order
/// (spec.md §6.1). The parser that produces this is out of scope; the core
/// consumes it as-is.
pub type Query = Vec<Statement>;

/// One `|tb:N|` or `|tb:min..max|` target (spec.md §4.6.1).
#[derive(Clone, Debug)]
pub enum Model {
	Count(u32),
	Range {
		min: Number,
		max: Number,
		step: Number,
	},
}

/// One element of a statement's `FROM`/target list, prior to resolution
/// against the KV store (spec.md §4.6.1).
#[derive(Clone, Debug)]
pub enum What {
	Thing(Thing),
	Table(String),
	Batch(String, Vec<Id>),
	Model(String, Model),
	/// A nested query whose result rows become targets.
	Subquery(Box<Query>),
	/// A session/statement-local variable, dereferenced before dispatch.
	Param(String),
	/// An already-resolved literal array of things/objects.
	Array(Array),
}

#[derive(Clone, Debug, Default)]
pub struct MutateCommon {
	pub what: Vec<What>,
	pub data: Option<Data>,
	pub cond: Option<Expr>,
	pub output: Echo,
	pub timeout: Option<Duration>,
	/// Run as part of foreign-table (view) maintenance: bypasses the
	/// view-mutation rejection (spec.md §4.6.2).
	pub virtual_run: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SelectStatement {
	pub what: Vec<What>,
	pub fields: Fields,
	pub cond: Option<Expr>,
	pub group: Option<Vec<Expr>>,
	pub order: Option<Vec<(Expr, bool)>>,
	pub start: Option<i64>,
	pub limit: Option<i64>,
	pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct RelateStatement {
	pub from: What,
	pub kind: String,
	pub to: What,
	pub data: Option<Data>,
	pub output: Echo,
	pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct InsertStatement {
	pub into: String,
	pub data: Vec<Data>,
	pub output: Echo,
	pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct DeleteStatement {
	pub common: MutateCommon,
	pub hard: bool,
}

/// The sequence of statement kinds the executor dispatches (spec.md §4.5,
/// §4.6).
#[derive(Clone, Debug)]
pub enum Statement {
	Use {
		ns: Option<String>,
		db: Option<String>,
	},
	Begin,
	Cancel,
	Commit,
	/// `RETURN expr` — collapses a buffered transaction to a single result.
	Output(Expr),
	/// `LET $name = expr`
	Set {
		name: String,
		value: Expr,
	},
	Select(SelectStatement),
	Create(MutateCommon),
	Update(MutateCommon),
	Upsert(MutateCommon),
	Delete(DeleteStatement),
	Insert(InsertStatement),
	Relate(RelateStatement),
	/// `IF cond THEN (query) ELSE IF cond THEN (query) ... ELSE (query) END`
	IfElse {
		branches: Vec<(Expr, Query)>,
		close: Option<Query>,
	},
	Define(Define),
}

#[derive(Clone, Debug)]
pub enum Define {
	Table(DefineTableStatement),
	/// `DEFINE FIELD ... ON TABLE <tb>`.
	Field(String, DefineFieldStatement),
	/// `DEFINE INDEX ... ON TABLE <tb>`.
	Index(String, DefineIndexStatement),
	/// `DEFINE EVENT ... ON TABLE <tb>`.
	Event(String, DefineEventStatement),
}

impl Statement {
	/// Whether this statement kind requires a writeable transaction
	/// (spec.md §4.5 step 3).
	pub fn writeable(&self) -> bool {
		matches!(
			self,
			Statement::Create(_)
				| Statement::Update(_)
				| Statement::Upsert(_)
				| Statement::Delete(_)
				| Statement::Insert(_)
				| Statement::Relate(_)
				| Statement::Define(_)
		)
	}

	pub fn timeout(&self) -> Option<Duration> {
		match self {
			Statement::Select(s) => s.timeout,
			Statement::Create(s) | Statement::Update(s) | Statement::Upsert(s) => s.timeout,
			Statement::Delete(s) => s.common.timeout,
			Statement::Insert(s) => s.timeout,
			Statement::Relate(s) => s.timeout,
			_ => None,
		}
	}

}
