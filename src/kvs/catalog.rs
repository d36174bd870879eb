//! The durable half of the schema: `DEFINE TABLE/FIELD/INDEX/EVENT` bodies.
//!
//! Catalog objects carry [`crate::sql::Expr`] closures (`ASSERT`, `VALUE`,
//! `WHEN`) that have no serialized form -- there is no parser in this crate
//! to re-derive them from bytes on a restart. So unlike record data, which
//! round-trips through the KV store as encoded bytes, catalog objects live
//! in a process-wide in-memory registry, keyed the same way their KV catalog
//! key would be. [`crate::kvs::cache::Cache`] still memoizes per-transaction
//! lookups against this registry exactly as it would against decoded KV
//! reads, so the cache-miss/lazy-load shape described in spec.md §4.3 is
//! unchanged; only the thing being loaded from is.
use crate::sql::{DefineEventStatement, DefineFieldStatement, DefineIndexStatement, DefineTableStatement};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct Catalog {
	tables: DashMap<(String, String, String), Arc<DefineTableStatement>>,
	fields: DashMap<(String, String, String), Arc<Vec<DefineFieldStatement>>>,
	indexes: DashMap<(String, String, String), Arc<Vec<DefineIndexStatement>>>,
	events: DashMap<(String, String, String), Arc<Vec<DefineEventStatement>>>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	fn scope(ns: &str, db: &str, tb: &str) -> (String, String, String) {
		(ns.to_string(), db.to_string(), tb.to_string())
	}

	pub fn put_tb(&self, ns: &str, db: &str, tb: &str, def: DefineTableStatement) {
		self.tables.insert(Self::scope(ns, db, tb), Arc::new(def));
	}

	pub fn get_tb(&self, ns: &str, db: &str, tb: &str) -> Option<Arc<DefineTableStatement>> {
		self.tables.get(&Self::scope(ns, db, tb)).map(|e| e.clone())
	}

	pub fn put_fd(&self, ns: &str, db: &str, tb: &str, def: DefineFieldStatement) {
		let key = Self::scope(ns, db, tb);
		let mut fds = self.fields.get(&key).map(|e| (**e).clone()).unwrap_or_default();
		fds.retain(|f| f.name != def.name);
		fds.push(def);
		self.fields.insert(key, Arc::new(fds));
	}

	pub fn get_fds(&self, ns: &str, db: &str, tb: &str) -> Arc<Vec<DefineFieldStatement>> {
		self.fields.get(&Self::scope(ns, db, tb)).map(|e| e.clone()).unwrap_or_default()
	}

	pub fn put_ix(&self, ns: &str, db: &str, tb: &str, def: DefineIndexStatement) {
		let key = Self::scope(ns, db, tb);
		let mut ixs = self.indexes.get(&key).map(|e| (**e).clone()).unwrap_or_default();
		ixs.retain(|i| i.name != def.name);
		ixs.push(def);
		self.indexes.insert(key, Arc::new(ixs));
	}

	pub fn get_ixs(&self, ns: &str, db: &str, tb: &str) -> Arc<Vec<DefineIndexStatement>> {
		self.indexes.get(&Self::scope(ns, db, tb)).map(|e| e.clone()).unwrap_or_default()
	}

	pub fn put_ev(&self, ns: &str, db: &str, tb: &str, def: DefineEventStatement) {
		let key = Self::scope(ns, db, tb);
		let mut evs = self.events.get(&key).map(|e| (**e).clone()).unwrap_or_default();
		evs.retain(|e| e.name != def.name);
		evs.push(def);
		self.events.insert(key, Arc::new(evs));
	}

	pub fn get_evs(&self, ns: &str, db: &str, tb: &str) -> Arc<Vec<DefineEventStatement>> {
		self.events.get(&Self::scope(ns, db, tb)).map(|e| e.clone()).unwrap_or_default()
	}
}
