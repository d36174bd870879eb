//! The key-value facade: a process-wide [`Datastore`] handle and the
//! [`Transaction`]s opened against it.
//!
//! Only the in-memory backend ships here (spec.md §4.2 treats the storage
//! engine as pluggable, but the teacher's non-memory backends -- RocksDB,
//! TiKV, FoundationDB, SurrealKV -- all sit behind a Cargo feature this
//! crate never turns on).

pub mod cache;
mod catalog;
mod mem;

use crate::err::Error;
use crate::sql::{DefineEventStatement, DefineFieldStatement, DefineIndexStatement, DefineTableStatement};
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type Key = Vec<u8>;
pub type Val = Vec<u8>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionType {
	Read,
	Write,
}

impl From<bool> for TransactionType {
	fn from(writeable: bool) -> Self {
		if writeable {
			TransactionType::Write
		} else {
			TransactionType::Read
		}
	}
}

/// A process-wide handle onto one in-memory keyspace.
pub struct Datastore {
	inner: Arc<mem::Store>,
	catalog: Arc<catalog::Catalog>,
}

impl Datastore {
	pub fn new() -> Self {
		Datastore {
			inner: Arc::new(mem::Store::new()),
			catalog: Arc::new(catalog::Catalog::new()),
		}
	}

	/// Open a new transaction. `write` requests a writeable transaction;
	/// readers never block writers or each other (spec.md §4.2).
	pub async fn transaction(&self, write: bool) -> Result<Transaction, Error> {
		let inner = mem::Store::open(self.inner.clone(), write.into()).await?;
		Ok(Transaction {
			inner,
			catalog: self.catalog.clone(),
			cache: cache::Cache::default(),
			done: false,
		})
	}
}

impl Default for Datastore {
	fn default() -> Self {
		Self::new()
	}
}

/// A set of reads and (if writeable) undoable writes against the store.
pub struct Transaction {
	inner: mem::Transaction,
	catalog: Arc<catalog::Catalog>,
	pub(crate) cache: cache::Cache,
	done: bool,
}

impl Transaction {
	fn check_open(&self) -> Result<(), Error> {
		if self.done {
			return Err(Error::Internal("transaction already closed".into()));
		}
		Ok(())
	}

	pub async fn get<K>(&mut self, key: K) -> Result<Option<Val>, Error>
	where
		K: Into<Key>,
	{
		self.check_open()?;
		self.inner.get(key.into()).await
	}

	pub async fn exists<K>(&mut self, key: K) -> Result<bool, Error>
	where
		K: Into<Key>,
	{
		Ok(self.get(key).await?.is_some())
	}

	/// Unconditional write.
	pub async fn set<K, V>(&mut self, key: K, val: V) -> Result<(), Error>
	where
		K: Into<Key>,
		V: Into<Val>,
	{
		self.check_open()?;
		self.inner.set(key.into(), val.into()).await
	}

	/// Write only if the key is absent; fails with [`Error::TxConditionNotMet`]
	/// otherwise.
	pub async fn put<K, V>(&mut self, key: K, val: V) -> Result<(), Error>
	where
		K: Into<Key>,
		V: Into<Val>,
	{
		self.check_open()?;
		self.inner.put(key.into(), val.into()).await
	}

	/// Write only if the existing value matches `chk` exactly (`None` means
	/// "key must be absent").
	pub async fn putc<K, V>(&mut self, key: K, val: V, chk: Option<V>) -> Result<(), Error>
	where
		K: Into<Key>,
		V: Into<Val>,
	{
		self.check_open()?;
		self.inner.putc(key.into(), val.into(), chk.map(Into::into)).await
	}

	pub async fn del<K>(&mut self, key: K) -> Result<(), Error>
	where
		K: Into<Key>,
	{
		self.check_open()?;
		self.inner.del(key.into()).await
	}

	/// Delete only if the existing value matches `chk` exactly.
	pub async fn delc<K, V>(&mut self, key: K, chk: Option<V>) -> Result<(), Error>
	where
		K: Into<Key>,
		V: Into<Val>,
	{
		self.check_open()?;
		self.inner.delc(key.into(), chk.map(Into::into)).await
	}

	pub async fn scan(&mut self, rng: Range<Key>, limit: u32) -> Result<Vec<(Key, Val)>, Error> {
		self.check_open()?;
		self.inner.scan(rng, limit).await
	}

	/// Delete every key in `rng`, in chunks of `limit`.
	pub async fn delr(&mut self, rng: Range<Key>, limit: u32) -> Result<(), Error> {
		self.check_open()?;
		let mut rng = rng;
		loop {
			let batch = self.inner.scan(rng.clone(), limit).await?;
			if batch.is_empty() {
				return Ok(());
			}
			let last = batch.last().unwrap().0.clone();
			for (k, _) in &batch {
				self.inner.del(k.clone()).await?;
			}
			if (batch.len() as u32) < limit {
				return Ok(());
			}
			let mut next = last;
			next.push(0x00);
			rng.start = next;
		}
	}

	pub async fn commit(&mut self) -> Result<(), Error> {
		self.check_open()?;
		self.done = true;
		self.inner.commit().await
	}

	pub async fn cancel(&mut self) -> Result<(), Error> {
		self.check_open()?;
		self.done = true;
		self.inner.cancel().await
	}

	// --------------------------------------------------
	// Catalog methods (spec.md §4.3): cache-through reads over the
	// process-wide catalog registry, populated by the `define_*` writers.
	// --------------------------------------------------

	pub async fn get_tb(&mut self, ns: &str, db: &str, tb: &str) -> Result<Option<Arc<DefineTableStatement>>, Error> {
		if let Some(def) = self.cache.get_tb(ns, db, tb) {
			return Ok(Some(def));
		}
		match self.catalog.get_tb(ns, db, tb) {
			Some(def) => {
				self.cache.set_tb(ns, db, tb, def.clone());
				Ok(Some(def))
			}
			None => Ok(None),
		}
	}

	pub async fn all_tb_fields(&mut self, ns: &str, db: &str, tb: &str) -> Result<Arc<Vec<DefineFieldStatement>>, Error> {
		if let Some(defs) = self.cache.get_fds(ns, db, tb) {
			return Ok(defs);
		}
		let defs = self.catalog.get_fds(ns, db, tb);
		self.cache.set_fds(ns, db, tb, defs.clone());
		Ok(defs)
	}

	pub async fn all_tb_indexes(&mut self, ns: &str, db: &str, tb: &str) -> Result<Arc<Vec<DefineIndexStatement>>, Error> {
		if let Some(defs) = self.cache.get_ixs(ns, db, tb) {
			return Ok(defs);
		}
		let defs = self.catalog.get_ixs(ns, db, tb);
		self.cache.set_ixs(ns, db, tb, defs.clone());
		Ok(defs)
	}

	pub async fn all_tb_events(&mut self, ns: &str, db: &str, tb: &str) -> Result<Arc<Vec<DefineEventStatement>>, Error> {
		if let Some(defs) = self.cache.get_evs(ns, db, tb) {
			return Ok(defs);
		}
		let defs = self.catalog.get_evs(ns, db, tb);
		self.cache.set_evs(ns, db, tb, defs.clone());
		Ok(defs)
	}

	/// `DEFINE TABLE`. Takes effect immediately: the in-memory catalog has
	/// no undo log of its own, so a `DEFINE` inside a cancelled transaction
	/// is not rolled back (documented simplification, see DESIGN.md).
	pub async fn define_table(&mut self, ns: &str, db: &str, def: DefineTableStatement) -> Result<(), Error> {
		self.require_write()?;
		let tb = def.name.clone();
		self.catalog.put_tb(ns, db, &tb, def);
		Ok(())
	}

	pub async fn define_field(&mut self, ns: &str, db: &str, tb: &str, def: DefineFieldStatement) -> Result<(), Error> {
		self.require_write()?;
		self.catalog.put_fd(ns, db, tb, def);
		Ok(())
	}

	pub async fn define_index(&mut self, ns: &str, db: &str, tb: &str, def: DefineIndexStatement) -> Result<(), Error> {
		self.require_write()?;
		self.catalog.put_ix(ns, db, tb, def);
		Ok(())
	}

	pub async fn define_event(&mut self, ns: &str, db: &str, tb: &str, def: DefineEventStatement) -> Result<(), Error> {
		self.require_write()?;
		self.catalog.put_ev(ns, db, tb, def);
		Ok(())
	}

	fn require_write(&self) -> Result<(), Error> {
		self.check_open()
	}
}

/// Wraps a transaction so it can be shared across the worker pool that
/// processes a single statement's documents (spec.md §4.4).
pub type SharedTransaction = Arc<Mutex<Transaction>>;
