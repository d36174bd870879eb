use crate::sql::Expr;

/// A single permission clause.
#[derive(Clone, Debug)]
pub enum Permission {
	Full,
	None,
	Specific(Expr),
}

impl Default for Permission {
	fn default() -> Self {
		Permission::Full
	}
}

/// The four statement-kind-scoped permission clauses a table or field
/// carries (spec.md §3.3).
#[derive(Clone, Debug, Default)]
pub struct Permissions {
	pub select: Permission,
	pub create: Permission,
	pub update: Permission,
	pub delete: Permission,
}

impl Permissions {
	pub fn none() -> Self {
		Permissions {
			select: Permission::None,
			create: Permission::None,
			update: Permission::None,
			delete: Permission::None,
		}
	}

	pub fn full() -> Self {
		Permissions {
			select: Permission::Full,
			create: Permission::Full,
			update: Permission::Full,
			delete: Permission::Full,
		}
	}

	pub fn for_kind(&self, kind: StatementKind) -> &Permission {
		match kind {
			StatementKind::Select => &self.select,
			StatementKind::Create => &self.create,
			StatementKind::Update | StatementKind::Upsert => &self.update,
			StatementKind::Delete => &self.delete,
			StatementKind::Relate | StatementKind::Insert => &self.create,
		}
	}
}

/// The kind of statement currently being run against a document; used to
/// select the right permission clause and the right echo defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
	Select,
	Create,
	Update,
	Upsert,
	Delete,
	Relate,
	Insert,
}

impl StatementKind {
	pub fn is_write(&self) -> bool {
		!matches!(self, StatementKind::Select)
	}

	pub fn as_method(&self) -> &'static str {
		match self {
			StatementKind::Select => "SELECT",
			StatementKind::Create => "CREATE",
			StatementKind::Update | StatementKind::Upsert => "UPDATE",
			StatementKind::Delete => "DELETE",
			StatementKind::Relate => "RELATE",
			StatementKind::Insert => "INSERT",
		}
	}
}
