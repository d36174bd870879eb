//! Per-record document processing (spec.md C7) and the event/subquery
//! dispatcher (C8).
//!
//! `Document::run` drives one record through
//! `Load -> Merge -> (cond) -> Fields -> Authorize -> Index -> Persist ->
//! Events -> Yield`, taking the C4 per-document lock for the duration of any
//! write. This is the unit of work the C6 worker pool runs concurrently, one
//! call per target record.
use crate::cnf;
use crate::ctx::{Context, MutableContext};
use crate::dbs::executor::run_statement;
use crate::dbs::iterator::{self, Operable, Processed};
use crate::dbs::lock::LockTable;
use crate::dbs::Options;
use crate::err::Error;
use crate::key;
use crate::sql::{
	Array, Assign, Data, DefineEventStatement, DefineFieldStatement, DefineIndexStatement, DocContext, Echo, Id,
	MutateCommon, Number, Object, Permission, Statement, StatementKind, Thing, Value,
};
use once_cell::sync::Lazy;

/// Process-wide C4 lock table: every write anywhere in the process contends
/// on the same table, keyed by `(ns, db, tb, id)`.
static LOCKS: Lazy<LockTable> = Lazy::new(LockTable::new);

pub(crate) struct Document;

impl Document {
	/// Runs one record through the full document pipeline for `stmt`.
	/// Returns `Ok(None)` for a row that should not appear in the statement's
	/// result (filtered by WHERE, a silent permission failure, or a view
	/// table), never an error for those cases -- only genuine failures
	/// (coercion, assertion, permission-as-error on write, KV failure,
	/// recursion overload) are `Err`.
	pub(crate) async fn run(ctx: &Context, opt: &Options, stmt: &Statement, processed: Processed) -> Result<Option<Value>, Error> {
		let ns = opt.ns()?.to_string();
		let db = opt.db()?.to_string();
		let kind = iterator::statement_kind(stmt);
		let common = iterator::statement_common(stmt);
		let output = iterator::statement_output(stmt);

		let tb = processed.rid.tb.clone();
		let mut rid = processed.rid;

		// C4: writers race-check against the recursion depth and serialize
		// via the write side; readers always take the read side, which never
		// contends with other readers (spec.md §4.4).
		let lock_key = LockTable::key(&ns, &db, &tb, &rid.id.to_raw());
		let _guard = if kind.is_write() {
			LOCKS.lock(lock_key, ctx.depth()).await?
		} else {
			LOCKS.rlock(lock_key).await?
		};

		// Load.
		let (before, existed) = load(ctx, &ns, &db, &tb, &mut rid, &processed.val).await?;
		if !existed && matches!(kind, StatementKind::Select | StatementKind::Delete) {
			return Ok(None);
		}

		// Merge.
		let mut after = before.clone();
		if let Some(MutateCommon {
			data: Some(data), ..
		}) = &common
		{
			merge(&mut after, data, &before, &rid, kind, opt)?;
		}

		// cond (WHERE).
		if let Some(cond) = common.as_ref().and_then(|c| c.cond.as_ref()) {
			let doc = doc_context(&before, &after, None, &rid, kind, opt);
			if !cond.compute(&doc)?.is_truthy() {
				return Ok(None);
			}
		}

		let (tb_def, fields) = {
			let mut tx = ctx.tx().lock_owned().await;
			let tb_def = tx.get_tb(&ns, &db, &tb).await?;
			let fields = tx.all_tb_fields(&ns, &db, &tb).await?;
			(tb_def, fields)
		};

		// Fields.
		match kind {
			StatementKind::Create | StatementKind::Update | StatementKind::Upsert => {
				apply_fields(&fields, &mut after, &before, &rid, kind, opt)?;
			}
			StatementKind::Select => {
				apply_select_visibility(&fields, &mut after, &before, &rid, opt)?;
			}
			StatementKind::Delete | StatementKind::Relate | StatementKind::Insert => {}
		}

		// Authorize.
		if let Some(def) = &tb_def {
			if opt.perms && !opt.auth.is_privileged() {
				let doc = doc_context(&before, &after, None, &rid, kind, opt);
				let authorized = match def.permissions.for_kind(kind) {
					Permission::Full => true,
					Permission::None => false,
					Permission::Specific(expr) => expr.compute(&doc)?.is_truthy(),
				};
				if !authorized {
					return Ok(None);
				}
			}
			// A `DROP` table accepts writes and discards them silently.
			if def.drop && kind.is_write() {
				return Ok(None);
			}
		}

		if kind.is_write() {
			let indexes = {
				let mut tx = ctx.tx().lock_owned().await;
				tx.all_tb_indexes(&ns, &db, &tb).await?
			};
			maintain_indexes(ctx, &ns, &db, &tb, &indexes, &before, &after, &rid, kind, existed).await?;

			persist(ctx, &ns, &db, &tb, &rid, &after, kind).await?;

			let events = {
				let mut tx = ctx.tx().lock_owned().await;
				tx.all_tb_events(&ns, &db, &tb).await?
			};
			fire_events(ctx, opt, &events, &before, &after, &rid, kind).await?;
		}

		Ok(yield_value(kind, output, &before, &after, &rid))
	}
}

fn doc_context(before: &Value, after: &Value, value: Option<Value>, rid: &Thing, kind: StatementKind, opt: &Options) -> DocContext {
	DocContext {
		before: before.clone(),
		after: after.clone(),
		value,
		this: Some(rid.clone()),
		method: Some(kind.as_method()),
		parent: opt.parent.clone(),
		origin: opt.origin.clone(),
		vars: Default::default(),
	}
}

/// Reads the record's current value. A generated id (`|tb:N|`) is resolved
/// to a concrete one here, at the point a worker actually claims it, not at
/// target-resolution time. An absent key yields an empty document rather
/// than `None`, so CREATE/UPDATE/UPSERT always have something to merge onto;
/// SELECT and DELETE reject the empty case themselves right after this call.
async fn load(ctx: &Context, ns: &str, db: &str, tb: &str, rid: &mut Thing, val: &Operable) -> Result<(Value, bool), Error> {
	if matches!(rid.id, crate::sql::Id::Generate(_)) {
		rid.id = crate::sql::Id::rand();
	}
	match val {
		Operable::Value(v) => Ok((v.clone(), true)),
		Operable::Fetch => {
			let key = key::thing::Thing::new(ns.to_string(), db.to_string(), tb.to_string(), rid.id.clone()).encode()?;
			let raw = {
				let mut tx = ctx.tx().lock_owned().await;
				tx.get(key).await?
			};
			match raw {
				Some(bytes) => {
					let val: Value = bincode::deserialize(&bytes).map_err(|e| Error::Kv(e.to_string()))?;
					Ok((val, true))
				}
				None => Ok((Value::Object(Object::default()), false)),
			}
		}
	}
}

/// Applies a statement's `Data` clause (spec.md §4.7.1 Merge): `CONTENT`
/// replaces the document wholesale, `MERGE` deep-merges an object into it,
/// `SET` applies per-path assignments where assigning `Value::None` deletes
/// the path and `+=`/`-=` treat the path as an array.
fn merge(after: &mut Value, data: &Data, before: &Value, rid: &Thing, kind: StatementKind, opt: &Options) -> Result<(), Error> {
	match data {
		Data::Content(expr) => {
			let doc = doc_context(before, after, None, rid, kind, opt);
			*after = expr.compute(&doc)?;
		}
		Data::Merge(expr) => {
			let doc = doc_context(before, after, None, rid, kind, opt);
			let patch = expr.compute(&doc)?;
			after.merge(patch);
		}
		Data::Set(assigns) => {
			for (path, assign, expr) in assigns {
				let doc = doc_context(before, after, None, rid, kind, opt);
				let val = expr.compute(&doc)?;
				match assign {
					Assign::Set => {
						if val.is_none() {
							after.cut(path);
						} else {
							after.put(path, val);
						}
					}
					Assign::Add => after.append(path, val),
					Assign::Sub => after.remove_from(path, &val),
				}
			}
		}
	}
	Ok(())
}

/// Applies every `DEFINE FIELD` in ascending priority order (ties break by
/// definition order, the order the catalog returns them in): compute `VALUE`
/// or fall back to `DEFAULT` when the field is absent, coerce against the
/// declared type, check `ASSERT`, then the field's own write permission
/// (spec.md §4.7.1 Fields).
fn apply_fields(
	fields: &[DefineFieldStatement],
	after: &mut Value,
	before: &Value,
	rid: &Thing,
	kind: StatementKind,
	opt: &Options,
) -> Result<(), Error> {
	let mut ordered: Vec<&DefineFieldStatement> = fields.iter().collect();
	ordered.sort_by_key(|f| f.priority);
	for fd in ordered {
		let key = fd.name.as_str();

		if let Some(value_expr) = &fd.value {
			let doc = doc_context(before, after, Some(after.get(key)), rid, kind, opt);
			let computed = value_expr.compute(&doc)?;
			after.put(key, computed);
		} else if after.get(key).is_none() {
			if let Some(default_expr) = &fd.default {
				let doc = doc_context(before, after, Some(Value::None), rid, kind, opt);
				let computed = default_expr.compute(&doc)?;
				after.put(key, computed);
			}
		}

		let current = after.get(key);
		if !fd.kind.accepts(&current) {
			return Err(Error::FieldCoerce {
				field: fd.name.clone(),
				thing: rid.clone(),
				value: current.to_string(),
				kind: fd.kind.name().to_string(),
			});
		}

		if let Some(assert_expr) = &fd.assert {
			let doc = doc_context(before, after, Some(current.clone()), rid, kind, opt);
			if !assert_expr.compute(&doc)?.is_truthy() {
				return Err(Error::FieldAssert {
					field: fd.name.clone(),
					thing: rid.clone(),
					value: current.to_string(),
					assertion: format!("{assert_expr:?}"),
				});
			}
		}

		match fd.permissions.for_kind(kind) {
			Permission::Full => {}
			Permission::None => {
				return Err(Error::FieldPermsError {
					field: fd.name.clone(),
				})
			}
			Permission::Specific(expr) => {
				let doc = doc_context(before, after, Some(current.clone()), rid, kind, opt);
				if !expr.compute(&doc)?.is_truthy() {
					return Err(Error::FieldPermsError {
						field: fd.name.clone(),
					});
				}
			}
		}
	}
	Ok(())
}

/// The read-side counterpart of field permissions: rather than rejecting the
/// whole row, a field a session can't see is silently cut from it (spec.md
/// §4.7.1 Fields, read path).
fn apply_select_visibility(fields: &[DefineFieldStatement], after: &mut Value, before: &Value, rid: &Thing, opt: &Options) -> Result<(), Error> {
	if !opt.perms || opt.auth.is_privileged() {
		return Ok(());
	}
	for fd in fields {
		let key = fd.name.as_str();
		let visible = match fd.permissions.for_kind(StatementKind::Select) {
			Permission::Full => true,
			Permission::None => false,
			Permission::Specific(expr) => {
				let doc = doc_context(before, after, Some(after.get(key)), rid, StatementKind::Select, opt);
				expr.compute(&doc)?.is_truthy()
			}
		};
		if !visible {
			after.cut(key);
		}
	}
	Ok(())
}

fn index_columns(doc: &Value, columns: &[String]) -> Array {
	Array(columns.iter().map(|c| doc.get(c)).collect())
}

/// Keeps every `DEFINE INDEX` current for this record: drops the entry for
/// the pre-mutation column values (skipped on CREATE, nothing existed to
/// track), then -- unless this is a DELETE -- checks `UNIQUE` indexes for a
/// collision with a *different* record before writing the new entry
/// (spec.md §4.7.1 Index diff).
#[allow(clippy::too_many_arguments)]
async fn maintain_indexes(
	ctx: &Context,
	ns: &str,
	db: &str,
	tb: &str,
	indexes: &[DefineIndexStatement],
	before: &Value,
	after: &Value,
	rid: &Thing,
	kind: StatementKind,
	existed: bool,
) -> Result<(), Error> {
	if indexes.is_empty() {
		return Ok(());
	}
	let mut tx = ctx.tx().lock_owned().await;
	for ix in indexes {
		if existed && !matches!(kind, StatementKind::Create) {
			let old_cols = index_columns(before, &ix.columns);
			let old_key = key::index::Index::new(ns, db, tb, ix.name.as_str(), old_cols, Some(rid.id.clone())).encode()?;
			tx.del(old_key).await?;
		}
		if matches!(kind, StatementKind::Delete) {
			continue;
		}

		let new_cols = index_columns(after, &ix.columns);
		if ix.unique {
			let prefix = key::index::prefix_for_values(ns, db, tb, ix.name.as_str(), &new_cols)?;
			let mut end = prefix.clone();
			end.push(0xff);
			let hits = tx.scan(prefix..end, 2).await?;
			let mut collides = false;
			for (k, _) in &hits {
				let existing = key::index::Index::decode(k)?;
				if existing.id.as_ref() != Some(&rid.id) {
					collides = true;
					break;
				}
			}
			if collides {
				return Err(Error::IndexExists {
					index: ix.name.clone(),
					value: Value::from(new_cols).to_string(),
					thing: rid.clone(),
				});
			}
		}
		let new_key = key::index::Index::new(ns, db, tb, ix.name.as_str(), new_cols, Some(rid.id.clone())).encode()?;
		tx.set(new_key, Vec::<u8>::new()).await?;
	}
	Ok(())
}

/// Writes the record (spec.md §4.7.1 Persist): CREATE uses a conditional put
/// that fails if the key already exists, UPDATE/UPSERT an unconditional
/// write, DELETE a removal. `HARD DELETE` behaves exactly like a normal
/// delete here -- there is no record history to purge in this backend
/// (documented simplification, see DESIGN.md).
async fn persist(ctx: &Context, ns: &str, db: &str, tb: &str, rid: &Thing, after: &Value, kind: StatementKind) -> Result<(), Error> {
	let thing_key = key::thing::Thing::new(ns.to_string(), db.to_string(), tb.to_string(), rid.id.clone()).encode()?;
	let mut tx = ctx.tx().lock_owned().await;
	match kind {
		StatementKind::Create => {
			let bytes = bincode::serialize(after).map_err(|e| Error::Kv(e.to_string()))?;
			tx.put(thing_key, bytes).await.map_err(|e| match e {
				Error::TxConditionNotMet => Error::RecordExists {
					thing: rid.clone(),
				},
				other => other,
			})?;
		}
		StatementKind::Update | StatementKind::Upsert => {
			let bytes = bincode::serialize(after).map_err(|e| Error::Kv(e.to_string()))?;
			tx.set(thing_key, bytes).await?;
		}
		StatementKind::Delete => {
			tx.del(thing_key).await?;
		}
		StatementKind::Select | StatementKind::Relate | StatementKind::Insert => {}
	}
	Ok(())
}

/// Fires every `DEFINE EVENT` whose `WHEN` evaluates truthy against this
/// mutation, re-entering the executor one recursion level deeper with
/// `$parent`/`$origin` pointing back at the document that triggered it
/// (spec.md §4.8). Results are discarded; an error (including a nested
/// [`Error::RecursiveOverload`]) propagates out of the whole document.
async fn fire_events(
	ctx: &Context,
	opt: &Options,
	events: &[DefineEventStatement],
	before: &Value,
	after: &Value,
	rid: &Thing,
	kind: StatementKind,
) -> Result<(), Error> {
	if events.is_empty() {
		return Ok(());
	}
	for ev in events {
		let doc = doc_context(before, after, None, rid, kind, opt);
		if !ev.when.compute(&doc)?.is_truthy() {
			continue;
		}
		if ctx.depth() + 1 > *cnf::MAX_RECURSIVE_QUERIES {
			warn!("event on {rid} would recurse past depth {}, aborting", *cnf::MAX_RECURSIVE_QUERIES);
			return Err(Error::RecursiveOverload);
		}
		let mut child = MutableContext::enter(ctx);
		child.set_transaction(ctx.tx());
		let child = child.freeze();
		let child_opt = opt.for_nested(rid.clone());
		for stmt in &ev.then {
			run_statement(&child, &child_opt, stmt).await?;
		}
	}
	Ok(())
}

/// Projects the result per the statement's echo mode (spec.md §4.7.1 Yield).
/// A DELETE's `Full`/`After` yield nothing -- the record is gone -- `Before`
/// still returns what it was. `Diff` is represented the same way as `Both`
/// here (a before/after pair) rather than a structural patch: nothing in
/// this core's dependency stack computes one, and a pair carries the same
/// information for a test or caller to compare (documented simplification).
fn yield_value(kind: StatementKind, output: Echo, before: &Value, after: &Value, rid: &Thing) -> Option<Value> {
	if matches!(kind, StatementKind::Delete) {
		return match output {
			Echo::None => None,
			Echo::Id => Some(Value::Thing(rid.clone())),
			Echo::Before => Some(with_id(before, rid)),
			Echo::Diff | Echo::Full | Echo::After | Echo::Both => None,
		};
	}
	match output {
		Echo::None => None,
		Echo::Id => Some(Value::Thing(rid.clone())),
		Echo::After | Echo::Full => Some(with_id(after, rid)),
		Echo::Before => Some(with_id(before, rid)),
		Echo::Both | Echo::Diff => {
			let mut obj = Object::default();
			obj.0.insert("before".to_string(), with_id(before, rid));
			obj.0.insert("after".to_string(), with_id(after, rid));
			Some(Value::Object(obj))
		}
	}
}

/// `meta.tb`/`meta.id` always agree with the record's key; the root-level
/// `id` mirrors them as the full `Thing` (spec.md §3.2).
fn with_id(v: &Value, rid: &Thing) -> Value {
	let mut v = v.clone();
	v.put("id", Value::Thing(rid.clone()));
	let mut meta = Object::default();
	meta.0.insert("tb".to_string(), Value::Strand(rid.tb.clone()));
	meta.0.insert("id".to_string(), id_to_value(&rid.id));
	v.put("meta", Value::Object(meta));
	v
}

fn id_to_value(id: &Id) -> Value {
	match id {
		Id::Number(v) => Value::Number(Number::Int(*v)),
		Id::String(s) => Value::Strand(s.clone()),
		Id::Array(a) => Value::Array(Array(a.clone())),
		Id::Object(o) => Value::Object(o.clone()),
		Id::Generate(_) => Value::None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sql::Object;

	#[test]
	fn with_id_sets_root_id_and_meta() {
		let rid = Thing::new("person", "one");
		let v = with_id(&Value::Object(Object::default()), &rid);
		assert_eq!(v.get("id"), Value::Thing(rid.clone()));
		assert_eq!(v.get("meta").get("tb"), Value::Strand("person".to_string()));
		assert_eq!(v.get("meta").get("id"), Value::Strand("one".to_string()));
	}

	#[test]
	fn id_to_value_covers_every_variant() {
		assert_eq!(id_to_value(&Id::Number(7)), Value::Number(Number::Int(7)));
		assert_eq!(id_to_value(&Id::String("x".to_string())), Value::Strand("x".to_string()));
		assert_eq!(id_to_value(&Id::Generate(crate::sql::Gen::Rand)), Value::None);
	}

	#[test]
	fn index_columns_projects_in_declared_order() {
		let mut obj = Object::default();
		obj.0.insert("b".to_string(), Value::from(2i64));
		obj.0.insert("a".to_string(), Value::from(1i64));
		let cols = index_columns(&Value::Object(obj), &["a".to_string(), "b".to_string()]);
		assert_eq!(cols, Array(vec![Value::from(1i64), Value::from(2i64)]));
	}
}
