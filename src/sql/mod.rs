//! The in-memory AST and value model consumed by the executor.
//!
//! There is no parser here: statements are built directly (by callers, or by
//! tests standing in for a SurrealQL front end) as [`Statement`] values.

pub mod data;
pub mod expr;
pub mod id;
pub mod number;
pub mod output;
pub mod permission;
pub mod schema;
pub mod statements;
pub mod thing;
pub mod value;

pub use data::{Assign, Data};
pub use expr::{DocContext, Expr};
pub use id::{Gen, Id};
pub use number::Number;
pub use output::{AggFn, Echo, Field, Fields};
pub use permission::{Permission, Permissions, StatementKind};
pub use schema::{DefineEventStatement, DefineFieldStatement, DefineIndexStatement, DefineTableStatement, FieldType};
pub use statements::{
	Define, DeleteStatement, InsertStatement, MutateCommon, Model, Query, RelateStatement, SelectStatement, Statement,
	What,
};
pub use thing::Thing;
pub use value::{compare_values, Array, Object, Value};
