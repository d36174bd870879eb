//! The per-transaction catalog cache (spec.md §4.3): a memo of schema
//! objects keyed by their catalog key, populated lazily from the KV store
//! and dropped along with the transaction that built it.
use crate::sql::{DefineEventStatement, DefineFieldStatement, DefineIndexStatement, DefineTableStatement};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) enum Entry {
	Tb(Arc<DefineTableStatement>),
	Fd(Arc<Vec<DefineFieldStatement>>),
	Ix(Arc<Vec<DefineIndexStatement>>),
	Ev(Arc<Vec<DefineEventStatement>>),
}

/// Cache keys are the same `(ns, db, tb)`-scoped strings the KV key encoders
/// would produce, minus the byte-level sentinels: readable enough to debug,
/// unique enough never to collide across schema-object kinds.
#[derive(Default)]
pub struct Cache {
	entries: HashMap<String, Entry>,
}

impl Cache {
	fn get(&self, key: &str) -> Option<&Entry> {
		self.entries.get(key)
	}

	fn set(&mut self, key: String, entry: Entry) {
		self.entries.insert(key, entry);
	}

	pub(crate) fn get_tb(&self, ns: &str, db: &str, tb: &str) -> Option<Arc<DefineTableStatement>> {
		match self.get(&format!("tb/{ns}/{db}/{tb}")) {
			Some(Entry::Tb(v)) => Some(v.clone()),
			_ => None,
		}
	}

	pub(crate) fn set_tb(&mut self, ns: &str, db: &str, tb: &str, v: Arc<DefineTableStatement>) {
		self.set(format!("tb/{ns}/{db}/{tb}"), Entry::Tb(v));
	}

	pub(crate) fn get_fds(&self, ns: &str, db: &str, tb: &str) -> Option<Arc<Vec<DefineFieldStatement>>> {
		match self.get(&format!("fd/{ns}/{db}/{tb}")) {
			Some(Entry::Fd(v)) => Some(v.clone()),
			_ => None,
		}
	}

	pub(crate) fn set_fds(&mut self, ns: &str, db: &str, tb: &str, v: Arc<Vec<DefineFieldStatement>>) {
		self.set(format!("fd/{ns}/{db}/{tb}"), Entry::Fd(v));
	}

	pub(crate) fn get_ixs(&self, ns: &str, db: &str, tb: &str) -> Option<Arc<Vec<DefineIndexStatement>>> {
		match self.get(&format!("ix/{ns}/{db}/{tb}")) {
			Some(Entry::Ix(v)) => Some(v.clone()),
			_ => None,
		}
	}

	pub(crate) fn set_ixs(&mut self, ns: &str, db: &str, tb: &str, v: Arc<Vec<DefineIndexStatement>>) {
		self.set(format!("ix/{ns}/{db}/{tb}"), Entry::Ix(v));
	}

	pub(crate) fn get_evs(&self, ns: &str, db: &str, tb: &str) -> Option<Arc<Vec<DefineEventStatement>>> {
		match self.get(&format!("ev/{ns}/{db}/{tb}")) {
			Some(Entry::Ev(v)) => Some(v.clone()),
			_ => None,
		}
	}

	pub(crate) fn set_evs(&mut self, ns: &str, db: &str, tb: &str, v: Arc<Vec<DefineEventStatement>>) {
		self.set(format!("ev/{ns}/{db}/{tb}"), Entry::Ev(v));
	}
}
