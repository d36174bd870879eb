//! The context threaded through a running query: bound variables,
//! cancellation, the statement's deadline, and the shared transaction handle
//! (spec.md §4.1, §6.3 TIMEOUT).
use crate::err::Error;
use crate::kvs::SharedTransaction;
use crate::sql::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trice::Instant;

pub type Context = Arc<MutableContext>;

/// Why a context stopped accepting further work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
	Timedout,
	Cancelled,
}

#[non_exhaustive]
pub struct MutableContext {
	parent: Option<Context>,
	deadline: Option<Instant>,
	/// The duration passed to [`Self::add_timeout`] that produced `deadline`,
	/// kept only so a timeout error can report the limit that was configured
	/// rather than however little of it happened to remain when checked.
	timeout_duration: Option<Duration>,
	cancelled: Arc<AtomicBool>,
	values: HashMap<Cow<'static, str>, Arc<Value>>,
	transaction: Option<SharedTransaction>,
	/// Recursion depth: how many nested event/subquery frames enclose this
	/// context (spec.md §4.4, §4.8). Zero at the outermost statement.
	depth: u32,
}

impl MutableContext {
	pub fn background() -> Self {
		MutableContext {
			parent: None,
			deadline: None,
			timeout_duration: None,
			cancelled: Arc::new(AtomicBool::new(false)),
			values: HashMap::new(),
			transaction: None,
			depth: 0,
		}
	}

	/// A child context: inherits the parent's transaction, values, and
	/// depth baseline; a fresh deadline and cancellation flag of its own
	/// (cancelling a child never cancels its parent).
	pub fn new(parent: &Context) -> Self {
		MutableContext {
			parent: Some(parent.clone()),
			deadline: parent.deadline,
			timeout_duration: parent.timeout_duration,
			cancelled: Arc::new(AtomicBool::new(false)),
			values: HashMap::new(),
			transaction: parent.transaction.clone(),
			depth: parent.depth,
		}
	}

	pub fn freeze(self) -> Context {
		Arc::new(self)
	}

	pub fn set_transaction(&mut self, txn: SharedTransaction) {
		self.transaction = Some(txn);
	}

	pub fn tx(&self) -> SharedTransaction {
		self.transaction.clone().expect("context has no transaction")
	}

	pub fn add_value(&mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Arc<Value>>) {
		self.values.insert(key.into(), value.into());
	}

	pub fn value(&self, key: &str) -> Option<Value> {
		if let Some(v) = self.values.get(key) {
			return Some((**v).clone());
		}
		self.parent.as_ref().and_then(|p| p.value(key))
	}

	/// Every bound variable reachable from this context, parent bindings
	/// overridden by a same-named child binding. Used to seed a
	/// [`crate::sql::DocContext`]'s `vars` for `LET`/query-param lookups
	/// outside a per-record pipeline (spec.md §6.1 `LET`).
	pub fn vars(&self) -> std::collections::BTreeMap<String, Value> {
		let mut out = match &self.parent {
			Some(p) => p.vars(),
			None => std::collections::BTreeMap::new(),
		};
		for (k, v) in &self.values {
			out.insert(k.to_string(), (**v).clone());
		}
		out
	}

	pub fn add_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
		let deadline = Instant::now().checked_add(timeout).ok_or_else(|| Error::Internal("timeout overflowed".into()))?;
		match self.deadline {
			Some(current) if current <= deadline => {}
			_ => {
				self.deadline = Some(deadline);
				self.timeout_duration = Some(timeout);
			}
		}
		Ok(())
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
	}

	/// One recursion level deeper, carrying the same deadline and
	/// transaction (spec.md §4.8 event dispatch, §4.4 subqueries).
	pub fn enter(parent: &Context) -> MutableContext {
		let mut ctx = MutableContext::new(parent);
		ctx.depth = parent.depth + 1;
		ctx
	}

	pub fn depth(&self) -> u32 {
		self.depth
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Relaxed);
	}

	fn is_timedout(&self) -> bool {
		self.deadline.map(|d| d <= Instant::now()).unwrap_or(false)
	}

	pub fn done(&self) -> Option<Reason> {
		if self.cancelled.load(Ordering::Relaxed) {
			return Some(Reason::Cancelled);
		}
		if self.is_timedout() {
			return Some(Reason::Timedout);
		}
		self.parent.as_ref().and_then(|p| p.done())
	}

	pub fn is_done(&self) -> bool {
		self.done().is_some()
	}

	/// Like [`Self::done`], but surfaces the specific error a caller should
	/// propagate: the configured `TIMEOUT` duration, not whatever remained of
	/// it by the time this was checked, or plain cancellation.
	pub fn check_done(&self) -> Result<(), Error> {
		if self.cancelled.load(Ordering::Relaxed) {
			return Err(Error::QueryCancelled);
		}
		if self.is_timedout() {
			return Err(Error::QueryTimedout(self.timeout_duration.unwrap_or_default()));
		}
		match &self.parent {
			Some(p) => p.check_done(),
			None => Ok(()),
		}
	}
}
