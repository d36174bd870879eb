use crate::dbs::session::AuthLevel;
use std::sync::Arc;

/// Per-statement processing options, derived from the [`Session`](crate::dbs::Session)
/// plus whatever an enclosing event/subquery frame overrides (spec.md §4.1,
/// §4.8).
#[derive(Clone, Debug)]
pub struct Options {
	ns: Option<Arc<str>>,
	db: Option<Arc<str>>,
	pub auth: Arc<AuthLevel>,
	/// Should table/field/event permission checks run at all? Importing
	/// trusted data can turn this off.
	pub perms: bool,
	/// Error out when a target table has no `DEFINE TABLE` and isn't
	/// `SCHEMALESS`. Off during permissive ad hoc writes.
	pub strict: bool,
	/// The record id of the document that caused this frame to run, for
	/// `$parent` (spec.md §4.8). `None` at the outermost statement.
	pub parent: Option<crate::sql::Thing>,
	/// The outermost record id in an event/subquery recursion chain, for
	/// `$origin`.
	pub origin: Option<crate::sql::Thing>,
}

impl Default for Options {
	fn default() -> Self {
		Options::new()
	}
}

impl Options {
	pub fn new() -> Options {
		Options {
			ns: None,
			db: None,
			auth: Arc::new(AuthLevel::default()),
			perms: true,
			strict: false,
			parent: None,
			origin: None,
		}
	}

	pub fn with_ns(mut self, ns: Option<Arc<str>>) -> Self {
		self.ns = ns;
		self
	}

	pub fn with_db(mut self, db: Option<Arc<str>>) -> Self {
		self.db = db;
		self
	}

	pub fn with_auth(mut self, auth: Arc<AuthLevel>) -> Self {
		self.auth = auth;
		self
	}

	pub fn ns(&self) -> Result<&str, crate::err::Error> {
		self.ns.as_deref().ok_or(crate::err::Error::NsEmpty)
	}

	pub fn db(&self) -> Result<&str, crate::err::Error> {
		self.db.as_deref().ok_or(crate::err::Error::DbEmpty)
	}

	/// A child options for one level of event/subquery recursion (spec.md
	/// §4.8): same ns/db/auth/perms, `parent` set to the record that
	/// triggered it, `origin` carried from the outermost frame.
	pub fn for_nested(&self, parent: crate::sql::Thing) -> Options {
		let origin = self.origin.clone().or_else(|| self.parent.clone()).or(Some(parent.clone()));
		Options {
			ns: self.ns.clone(),
			db: self.db.clone(),
			auth: self.auth.clone(),
			perms: self.perms,
			strict: self.strict,
			parent: Some(parent),
			origin,
		}
	}
}
