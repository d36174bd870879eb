//! A single in-memory keyspace, snapshot-isolated: a transaction reads (and
//! writes into) a private copy of the map taken when it opened, and only the
//! single live writer's snapshot is published back at commit.
use super::{Key, TransactionType, Val};
use crate::err::Error;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

pub(super) struct Store {
	data: StdMutex<BTreeMap<Key, Val>>,
	writer: Arc<Mutex<()>>,
}

impl Store {
	pub fn new() -> Self {
		Store {
			data: StdMutex::new(BTreeMap::new()),
			writer: Arc::new(Mutex::new(())),
		}
	}

	pub async fn open(store: Arc<Store>, kind: TransactionType) -> Result<Transaction, Error> {
		let write = matches!(kind, TransactionType::Write);
		let write_guard = if write {
			Some(store.writer.clone().lock_owned().await)
		} else {
			None
		};
		let snapshot = store.data.lock().map_err(|_| Error::Internal("store lock poisoned".into()))?.clone();
		Ok(Transaction {
			store,
			write,
			snapshot,
			write_guard,
		})
	}
}

pub(super) struct Transaction {
	store: Arc<Store>,
	write: bool,
	snapshot: BTreeMap<Key, Val>,
	write_guard: Option<OwnedMutexGuard<()>>,
}

impl Transaction {
	fn require_write(&self) -> Result<(), Error> {
		if !self.write {
			return Err(Error::TxReadonly);
		}
		Ok(())
	}

	pub async fn get(&mut self, key: Key) -> Result<Option<Val>, Error> {
		Ok(self.snapshot.get(&key).cloned())
	}

	pub async fn set(&mut self, key: Key, val: Val) -> Result<(), Error> {
		self.require_write()?;
		self.snapshot.insert(key, val);
		Ok(())
	}

	pub async fn put(&mut self, key: Key, val: Val) -> Result<(), Error> {
		self.require_write()?;
		if self.snapshot.contains_key(&key) {
			return Err(Error::TxConditionNotMet);
		}
		self.snapshot.insert(key, val);
		Ok(())
	}

	pub async fn putc(&mut self, key: Key, val: Val, chk: Option<Val>) -> Result<(), Error> {
		self.require_write()?;
		if self.snapshot.get(&key) != chk.as_ref() {
			return Err(Error::TxConditionNotMet);
		}
		self.snapshot.insert(key, val);
		Ok(())
	}

	pub async fn del(&mut self, key: Key) -> Result<(), Error> {
		self.require_write()?;
		self.snapshot.remove(&key);
		Ok(())
	}

	pub async fn delc(&mut self, key: Key, chk: Option<Val>) -> Result<(), Error> {
		self.require_write()?;
		if self.snapshot.get(&key) != chk.as_ref() {
			return Err(Error::TxConditionNotMet);
		}
		self.snapshot.remove(&key);
		Ok(())
	}

	pub async fn scan(&mut self, rng: Range<Key>, limit: u32) -> Result<Vec<(Key, Val)>, Error> {
		Ok(self
			.snapshot
			.range(rng)
			.take(limit as usize)
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect())
	}

	pub async fn commit(&mut self) -> Result<(), Error> {
		if self.write {
			let mut data = self.store.data.lock().map_err(|_| Error::Internal("store lock poisoned".into()))?;
			*data = std::mem::take(&mut self.snapshot);
		}
		self.write_guard.take();
		Ok(())
	}

	pub async fn cancel(&mut self) -> Result<(), Error> {
		self.write_guard.take();
		Ok(())
	}
}
