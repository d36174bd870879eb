use std::sync::Arc;

/// The authentication level a session carries (spec.md §4.6.2: whether a
/// session is privileged enough to bypass record-level permission checks).
/// Scope/token-based user auth (`SC`) is out of scope here; anything short
/// of root/ns/db auth is modelled as `Scope`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthLevel {
	Root,
	Namespace,
	Database,
	#[default]
	Scope,
}

impl AuthLevel {
	/// Root/NS/DB sessions bypass table and field permission checks
	/// entirely (spec.md §4.6.2).
	pub fn is_privileged(&self) -> bool {
		!matches!(self, AuthLevel::Scope)
	}
}

/// Connection-level information for the lifetime of a query (spec.md §4.1).
#[derive(Clone, Debug, Default)]
pub struct Session {
	pub au: Arc<AuthLevel>,
	pub ns: Option<String>,
	pub db: Option<String>,
}

impl Session {
	pub fn with_ns(mut self, ns: impl Into<String>) -> Self {
		self.ns = Some(ns.into());
		self
	}

	pub fn with_db(mut self, db: impl Into<String>) -> Self {
		self.db = Some(db.into());
		self
	}

	pub fn with_auth(mut self, level: AuthLevel) -> Self {
		self.au = Arc::new(level);
		self
	}
}
