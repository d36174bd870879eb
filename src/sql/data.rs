use crate::sql::Expr;

/// How a single `SET` assignment combines with the existing field value
/// (spec.md §4.7.1 `BinaryExpression`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assign {
	/// `=`
	Set,
	/// `+=` (array append)
	Add,
	/// `-=` (array remove)
	Sub,
}

/// The `Data` clause of a mutation statement (spec.md §4.7.1 Merge).
#[derive(Clone)]
pub enum Data {
	/// `SET path = expr, path += expr, ...`. Assigning `Value::None` deletes
	/// the path.
	Set(Vec<(String, Assign, Expr)>),
	/// `MERGE { ... }`: deep-merges the evaluated object into `data`.
	Merge(Expr),
	/// `CONTENT { ... }`: replaces `data` wholesale. Never touches
	/// `meta`/`time`, which stay system-managed.
	Content(Expr),
}

impl std::fmt::Debug for Data {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Data::Set(v) => f.debug_tuple("Set").field(&v.len()).finish(),
			Data::Merge(_) => write!(f, "Merge(..)"),
			Data::Content(_) => write!(f, "Content(..)"),
		}
	}
}
