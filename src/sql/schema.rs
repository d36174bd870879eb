use crate::sql::permission::Permissions;
use crate::sql::Expr;

/// `DEFINE TABLE` (spec.md §3.3).
#[derive(Clone, Debug)]
pub struct DefineTableStatement {
	pub name: String,
	pub schemafull: bool,
	/// `DROP`: writes are accepted but discarded.
	pub drop: bool,
	/// `AS SELECT ...` view: mutation is rejected, only trigger-maintained.
	pub lock: bool,
	/// Source tables this view is derived `FROM`.
	pub from: Vec<String>,
	pub permissions: Permissions,
}

impl DefineTableStatement {
	pub fn new(name: impl Into<String>) -> Self {
		DefineTableStatement {
			name: name.into(),
			schemafull: false,
			drop: false,
			lock: false,
			from: Vec::new(),
			permissions: Permissions::full(),
		}
	}

	/// A view table: `lock` is set, maintained by foreign-table triggers.
	pub fn view(name: impl Into<String>, from: Vec<String>) -> Self {
		let mut tb = Self::new(name);
		tb.lock = true;
		tb.from = from;
		tb
	}
}

/// The declared type of a field, used for coercion (spec.md §4.7.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
	Any,
	Bool,
	Number,
	Int,
	String,
	Datetime,
	Array,
	Object,
	Record,
}

impl FieldType {
	/// Does `v` already satisfy this declared type?
	pub fn accepts(&self, v: &crate::sql::Value) -> bool {
		use crate::sql::Value as V;
		match self {
			FieldType::Any => true,
			FieldType::Bool => matches!(v, V::Bool(_)),
			FieldType::Number => matches!(v, V::Number(_)),
			FieldType::Int => matches!(v, V::Number(n) if n.is_integer()),
			FieldType::String => matches!(v, V::Strand(_)),
			FieldType::Datetime => matches!(v, V::Datetime(_)),
			FieldType::Array => matches!(v, V::Array(_)),
			FieldType::Object => matches!(v, V::Object(_)),
			FieldType::Record => matches!(v, V::Thing(_)),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			FieldType::Any => "any",
			FieldType::Bool => "bool",
			FieldType::Number => "number",
			FieldType::Int => "int",
			FieldType::String => "string",
			FieldType::Datetime => "datetime",
			FieldType::Array => "array",
			FieldType::Object => "object",
			FieldType::Record => "record",
		}
	}
}

/// `DEFINE FIELD` (spec.md §3.3, §4.7.1). Applied in ascending `priority`
/// order; ties break by definition order (spec.md §9 Open Question,
/// resolved — see DESIGN.md).
#[derive(Clone, Debug)]
pub struct DefineFieldStatement {
	pub name: String,
	/// Dotted path into `data`, e.g. `address.city`. A bare name for
	/// top-level fields.
	pub path: Vec<String>,
	pub kind: FieldType,
	pub default: Option<Expr>,
	pub value: Option<Expr>,
	pub assert: Option<Expr>,
	pub priority: i64,
	pub permissions: Permissions,
}

impl DefineFieldStatement {
	pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
		let name = name.into();
		let path = name.split('.').map(|s| s.to_string()).collect();
		DefineFieldStatement {
			name,
			path,
			kind,
			default: None,
			value: None,
			assert: None,
			priority: 0,
			permissions: Permissions::full(),
		}
	}

	pub fn with_assert(mut self, assert: Expr) -> Self {
		self.assert = Some(assert);
		self
	}

	pub fn with_value(mut self, value: Expr) -> Self {
		self.value = Some(value);
		self
	}

	pub fn with_priority(mut self, priority: i64) -> Self {
		self.priority = priority;
		self
	}
}

/// `DEFINE INDEX` (spec.md §3.3, §4.7.1).
#[derive(Clone, Debug)]
pub struct DefineIndexStatement {
	pub name: String,
	pub columns: Vec<String>,
	pub unique: bool,
}

impl DefineIndexStatement {
	pub fn new(name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
		DefineIndexStatement {
			name: name.into(),
			columns,
			unique,
		}
	}
}

/// `DEFINE EVENT` (spec.md §3.3, §4.8).
#[derive(Clone)]
pub struct DefineEventStatement {
	pub name: String,
	pub when: Expr,
	pub then: crate::sql::statements::Query,
}

impl std::fmt::Debug for DefineEventStatement {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("DefineEventStatement").field("name", &self.name).finish()
	}
}
