use crate::dbs::Status;
use crate::sql::Thing;
use std::time::Duration;
use thiserror::Error;

/// The single error type produced anywhere in the query execution core.
///
/// Every variant maps to one row of the error taxonomy: `status()` performs
/// that mapping and is the only place that does.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// The underlying KV store failed to read or write.
	#[error("The key-value store reported an error: {0}")]
	Db(String),

	/// A key or value could not be decoded.
	#[error("Malformed key or value: {0}")]
	Kv(String),

	/// A raw conditional KV write (`putc`/`delc`) did not find the expected
	/// existing value. The document layer maps this onto a more specific
	/// domain error ([`Error::RecordExists`], [`Error::IndexExists`]) before
	/// it ever reaches a caller.
	#[error("Value being checked was not correct")]
	TxConditionNotMet,

	/// The transaction was already committed or cancelled.
	#[error("Transaction is already finished")]
	TxFinished,

	/// A write was attempted against a read-only transaction.
	#[error("Transaction is read-only")]
	TxReadonly,

	/// A conditional put failed because the key already existed.
	#[error("Database record '{thing}' already exists")]
	RecordExists {
		thing: Thing,
	},

	/// A unique index collided with an existing entry.
	#[error("Database index `{index}` already contains {value}, with record `{thing}`")]
	IndexExists {
		index: String,
		value: String,
		thing: Thing,
	},

	/// A table- or field-level permission expression evaluated to `false`.
	#[error("You don't have permission to perform this action")]
	PermsError,

	/// A field-level permission expression evaluated to `false`.
	#[error("You don't have permission to view field `{field}`")]
	FieldPermsError {
		field: String,
	},

	/// A field's value did not coerce to its declared type.
	#[error("Found {value} for field `{field}`, with record `{thing}`, but expected a {kind}")]
	FieldCoerce {
		field: String,
		thing: Thing,
		value: String,
		kind: String,
	},

	/// A field's `ASSERT` clause evaluated to `false`.
	#[error("Found {value} for field `{field}`, with record `{thing}`, but field must conform to: {assertion}")]
	FieldAssert {
		field: String,
		thing: Thing,
		value: String,
		assertion: String,
	},

	/// A mutation targeted a view table (`DEFINE TABLE ... AS SELECT`).
	#[error("Unable to write to the `{table}` table while setup as a view")]
	TableIsView {
		table: String,
	},

	/// A statement-level `TIMEOUT` deadline elapsed.
	#[error("Query timeout of {0:?} exceeded")]
	QueryTimedout(Duration),

	/// The query as a whole was cancelled by the caller.
	#[error("The query was not executed due to a cancelled transaction")]
	QueryCancelled,

	/// A statement following a failed one inside an explicit transaction.
	#[error("The query was not executed due to a failed transaction")]
	QueryNotExecuted,

	/// As above, but carrying the inner commit failure that caused it.
	#[error("The query was not executed due to a failed transaction: {message}")]
	QueryNotExecutedDetail {
		message: String,
	},

	/// A nested update attempted to lock a document already locked by an
	/// outer (shallower) recursion frame.
	#[error("Failed to update the same document recursively")]
	RaceCondition,

	/// Recursion depth exceeded `MAX_RECURSIVE_QUERIES`.
	#[error("Infinite loop when running recursive subqueries")]
	RecursiveOverload,

	/// The namespace does not exist.
	#[error("The namespace '{value}' does not exist")]
	NsNotFound {
		value: String,
	},

	/// The database does not exist.
	#[error("The database '{value}' does not exist")]
	DbNotFound {
		value: String,
	},

	/// The table does not exist, and was not permitted to be defined.
	#[error("The table '{value}' does not exist")]
	TbNotFound {
		value: String,
	},

	/// No namespace has been selected on this session.
	#[error("Specify a namespace to use")]
	NsEmpty,

	/// No database has been selected on this session.
	#[error("Specify a database to use")]
	DbEmpty,

	/// A target value could not be used for this statement kind.
	#[error("Can not execute {op} query using value '{value}' with type '{kind}'")]
	InvalidStatementTarget {
		op: String,
		value: String,
		kind: String,
	},

	/// An id could not be derived from a value.
	#[error("Expected a valid record id, found '{value}'")]
	IdInvalid {
		value: String,
	},

	/// A row was processed but should not be yielded (e.g. it failed the
	/// table-level permission check silently, or failed a WHERE clause).
	#[error("Ignored")]
	Ignore,

	/// Any other evaluation failure surfaced by the expression evaluator.
	#[error("{0}")]
	Thrown(String),

	/// An internal invariant was violated; always a bug, never user-facing.
	#[error("Internal error: {0}")]
	Internal(String),
}

impl Error {
	/// Map this error onto the response status taxonomy (spec.md §4.5/§7).
	pub fn status(&self) -> Status {
		use Error::*;
		match self {
			Db(_) => Status::ErrDb,
			Kv(_) | RecordExists {
				..
			} => Status::ErrKv,
			IndexExists {
				..
			} => Status::ErrIx,
			PermsError
			| FieldPermsError {
				..
			} => Status::ErrPe,
			FieldCoerce {
				..
			}
			| FieldAssert {
				..
			} => Status::ErrFd,
			TableIsView {
				..
			} => Status::ErrTb,
			_ => Status::Err,
		}
	}
}

macro_rules! fail {
	($($t:tt)*) => {
		$crate::err::Error::Internal(format!($($t)*))
	};
}
pub(crate) use fail;
