//! Per-statement target resolution, worker dispatch, and result assembly
//! (spec.md C6).
//!
//! Target resolution walks the statement's `FROM`/target list down to a flat
//! set of record ids; the worker pool then runs one C7 document pass per id.
//! Workers run concurrently via `futures::stream::buffer_unordered` rather
//! than the teacher's hand-rolled channel pool -- the teacher's extra
//! machinery exists to let a statement stop early once LIMIT is satisfied
//! without processing the remaining targets, which this core trades away for
//! simplicity (documented in DESIGN.md).
use crate::ctx::Context;
use crate::dbs::options::Options;
use crate::doc::Document;
use crate::err::Error;
use crate::key;
use crate::sql::{
	compare_values, AggFn, Echo, Field, Fields, Gen, Id, Model, MutateCommon, Number, Object, Statement, StatementKind,
	Thing, Value, What,
};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// One unit of work the iterator hands to a worker: a record identity, plus
/// whatever value resolution already produced for it.
pub(crate) struct Processed {
	pub rid: Thing,
	pub val: Operable,
}

/// What a worker already knows about a record before C7 loads it. The
/// common case is `Fetch`: the worker reads the current value itself. A
/// table scan hands over the value it already read while enumerating the
/// range, saving a second KV round-trip.
pub(crate) enum Operable {
	Fetch,
	Value(Value),
}

pub(crate) async fn resolve_targets(ctx: &Context, opt: &Options, what: &[What], kind: StatementKind) -> Result<Vec<Processed>, Error> {
	let mut out = Vec::new();
	for w in what {
		resolve_one(ctx, opt, w, kind, &mut out).await?;
	}
	Ok(out)
}

/// Table-level permission and existence pre-check (spec.md §4.6.2), run once
/// per distinct statically-known target table before any record is touched.
/// `Subquery`/`Param`/`Array` targets are dynamic and skip this check; any
/// permission failure they carry is caught per-document instead.
pub(crate) async fn check_tables(
	ctx: &Context,
	opt: &Options,
	kind: StatementKind,
	what: &[What],
	virtual_run: bool,
) -> Result<(), Error> {
	let mut seen = Vec::new();
	for w in what {
		let tb = match w {
			What::Thing(t) => t.tb.as_str(),
			What::Table(tb) => tb.as_str(),
			What::Batch(tb, _) => tb.as_str(),
			What::Model(tb, _) => tb.as_str(),
			What::Subquery(_) | What::Param(_) | What::Array(_) => continue,
		};
		if seen.iter().any(|s: &String| s == tb) {
			continue;
		}
		seen.push(tb.to_string());
		check_table(ctx, opt, kind, tb, virtual_run).await?;
	}
	Ok(())
}

async fn check_table(ctx: &Context, opt: &Options, kind: StatementKind, tb: &str, virtual_run: bool) -> Result<(), Error> {
	let ns = opt.ns()?.to_string();
	let db = opt.db()?.to_string();
	let def = {
		let mut tx = ctx.tx().lock_owned().await;
		tx.get_tb(&ns, &db, tb).await?
	};
	let Some(def) = def else {
		return Ok(());
	};
	if kind.is_write() && def.lock && !virtual_run {
		return Err(Error::TableIsView {
			table: tb.to_string(),
		});
	}
	if opt.auth.is_privileged() || !opt.perms {
		return Ok(());
	}
	let doc = crate::sql::DocContext::default();
	match def.permissions.for_kind(kind) {
		crate::sql::Permission::None => Err(Error::PermsError),
		crate::sql::Permission::Full => Ok(()),
		crate::sql::Permission::Specific(expr) => {
			if expr.compute(&doc)?.is_truthy() {
				Ok(())
			} else {
				Err(Error::PermsError)
			}
		}
	}
}

#[async_recursion::async_recursion]
async fn resolve_one(ctx: &Context, opt: &Options, what: &What, kind: StatementKind, out: &mut Vec<Processed>) -> Result<(), Error> {
	match what {
		What::Thing(t) => out.push(Processed {
			rid: t.clone(),
			val: Operable::Fetch,
		}),
		// `CREATE person` (no id given) generates one fresh record rather than
		// scanning the table -- the same shorthand `CREATE |person:1|` spells
		// out explicitly (spec.md §4.6.1 Model). Every other statement kind
		// targeting a bare table name runs a genuine range scan.
		What::Table(tb) if kind == StatementKind::Create => out.push(Processed {
			rid: Thing::new(tb.clone(), Id::Generate(Gen::Rand)),
			val: Operable::Fetch,
		}),
		What::Table(tb) => resolve_table_scan(ctx, opt, tb, out).await?,
		What::Batch(tb, ids) => {
			for id in ids {
				out.push(Processed {
					rid: Thing::new(tb.clone(), id.clone()),
					val: Operable::Fetch,
				});
			}
		}
		What::Model(tb, Model::Count(n)) => {
			for _ in 0..*n {
				out.push(Processed {
					rid: Thing::new(tb.clone(), Id::Generate(Gen::Rand)),
					val: Operable::Fetch,
				});
			}
		}
		What::Model(
			tb,
			Model::Range {
				min,
				max,
				step,
			},
		) => {
			for id in model_range_ids(min, max, step) {
				out.push(Processed {
					rid: Thing::new(tb.clone(), id),
					val: Operable::Fetch,
				});
			}
		}
		What::Subquery(q) => {
			let rows = crate::dbs::executor::run_nested_rows(ctx, opt, q).await?;
			for row in rows {
				push_value_as_target(row, out)?;
			}
		}
		What::Param(name) => match ctx.value(name).unwrap_or(Value::None) {
			Value::Array(a) => {
				for v in a.0 {
					push_value_as_target(v, out)?;
				}
			}
			other => push_value_as_target(other, out)?,
		},
		What::Array(a) => {
			for v in a.0.iter().cloned() {
				push_value_as_target(v, out)?;
			}
		}
	}
	Ok(())
}

async fn resolve_table_scan(ctx: &Context, opt: &Options, tb: &str, out: &mut Vec<Processed>) -> Result<(), Error> {
	let ns = opt.ns()?.to_string();
	let db = opt.db()?.to_string();
	let mut cursor = key::thing::prefix(&ns, &db, tb);
	let end = key::thing::suffix(&ns, &db, tb);
	loop {
		let batch = {
			let mut tx = ctx.tx().lock_owned().await;
			tx.scan(cursor.clone()..end.clone(), crate::cnf::TABLE_SCAN_CHUNK_SIZE).await?
		};
		if batch.is_empty() {
			break;
		}
		let last_key = batch.last().unwrap().0.clone();
		let full = batch.len() as u32 == crate::cnf::TABLE_SCAN_CHUNK_SIZE;
		for (k, v) in &batch {
			let thing = key::thing::Thing::decode(k)?;
			let val: Value = bincode::deserialize(v).map_err(|e| Error::Kv(e.to_string()))?;
			out.push(Processed {
				rid: Thing::new(thing.tb, thing.id),
				val: Operable::Value(val),
			});
		}
		if !full {
			break;
		}
		let mut next = last_key;
		next.push(0x00);
		cursor = next;
	}
	Ok(())
}

fn push_value_as_target(v: Value, out: &mut Vec<Processed>) -> Result<(), Error> {
	match v {
		Value::Thing(t) => out.push(Processed {
			rid: t,
			val: Operable::Fetch,
		}),
		Value::Object(ref o) => {
			let tb = match o.0.get("tb") {
				Some(Value::Strand(s)) => s.clone(),
				_ => {
					return Err(Error::InvalidStatementTarget {
						op: "ITERATE".into(),
						value: v.to_string(),
						kind: v.kindof().to_string(),
					})
				}
			};
			let id: Id = o.0.get("id").cloned().unwrap_or(Value::None).try_into()?;
			out.push(Processed {
				rid: Thing::new(tb, id),
				val: Operable::Value(v.clone()),
			});
		}
		other => {
			return Err(Error::InvalidStatementTarget {
				op: "ITERATE".into(),
				value: other.to_string(),
				kind: other.kindof().to_string(),
			})
		}
	}
	Ok(())
}

/// Builds the id sequence for a `|tb:min..max|` model target (spec.md
/// §4.6.1): step defaults to 1 when given as zero, decimal steps are walked
/// with `rust_decimal` so repeated addition never drifts off the expected
/// grid the way `f64` accumulation would.
fn model_range_ids(min: &Number, max: &Number, step: &Number) -> Vec<Id> {
	let min = min.as_decimal();
	let max = max.as_decimal();
	let mut step = step.as_decimal();
	if step.is_zero() {
		step = Decimal::ONE;
	}
	let ascending = min <= max;
	step = if ascending {
		step.abs()
	} else {
		-step.abs()
	};
	let mut ids = Vec::new();
	let mut cur = min;
	loop {
		if (ascending && cur > max) || (!ascending && cur < max) {
			break;
		}
		ids.push(Id::from(Number::Decimal(cur)));
		cur += step;
	}
	ids
}

/// Drives the worker pool over a resolved target set, running C7 for each
/// record, then applies GROUP/ORDER/START/LIMIT (spec.md §4.6.3-§4.6.5).
pub(crate) async fn run(ctx: &Context, opt: &Options, stmt: &Statement, targets: Vec<Processed>) -> Result<Vec<Value>, Error> {
	let worker_count = (*crate::cnf::WORKER_COUNT).clamp(1, targets.len().max(1));

	let outcomes: Vec<Result<Option<Value>, Error>> = stream::iter(targets.into_iter().map(|p| {
		let ctx = ctx.clone();
		let opt = opt.clone();
		async move {
			ctx.check_done()?;
			Document::run(&ctx, &opt, stmt, p).await
		}
	}))
	.buffer_unordered(worker_count)
	.collect()
	.await;

	let mut results = Vec::new();
	for outcome in outcomes {
		match outcome {
			Ok(Some(v)) => results.push(v),
			Ok(None) => {}
			Err(Error::Ignore) => {}
			Err(e) => return Err(e),
		}
	}

	if let Statement::Select(s) = stmt {
		results = match &s.group {
			Some(groups) => group_results(results, groups, &s.fields)?,
			None => project_all(results, &s.fields)?,
		};
		if let Some(order) = &s.order {
			results.sort_by(|a, b| order_cmp(a, b, order));
		}
		let start = s.start.unwrap_or(0).max(0) as usize;
		let limited: Vec<Value> = match s.limit {
			Some(l) if l >= 0 => results.into_iter().skip(start).take(l as usize).collect(),
			_ => results.into_iter().skip(start).collect(),
		};
		return Ok(limited);
	}
	Ok(results)
}

fn project_all(results: Vec<Value>, fields: &Fields) -> Result<Vec<Value>, Error> {
	match fields {
		Fields::All => Ok(results),
		Fields::Some(fs) => results.iter().map(|v| project_row(v, fs)).collect(),
	}
}

fn project_row(v: &Value, fs: &[Field]) -> Result<Value, Error> {
	let doc = crate::sql::DocContext {
		after: v.clone(),
		..Default::default()
	};
	let mut obj = Object::default();
	for f in fs {
		if let Field::Value {
			alias,
			expr,
		} = f
		{
			obj.0.insert(alias.clone(), expr.compute(&doc)?);
		}
	}
	Ok(Value::Object(obj))
}

fn group_results(results: Vec<Value>, groups: &[crate::sql::Expr], fields: &Fields) -> Result<Vec<Value>, Error> {
	use std::collections::BTreeMap;
	let mut buckets: BTreeMap<String, Vec<Value>> = BTreeMap::new();
	let mut order: Vec<String> = Vec::new();
	for row in results {
		let doc = crate::sql::DocContext {
			after: row.clone(),
			..Default::default()
		};
		let mut key = String::new();
		for g in groups {
			key.push_str(&g.compute(&doc)?.to_string());
			key.push('\u{1}');
		}
		if !buckets.contains_key(&key) {
			order.push(key.clone());
		}
		buckets.entry(key).or_default().push(row);
	}
	let fs = match fields {
		Fields::All => {
			return Ok(order.into_iter().filter_map(|k| buckets.remove(&k)).filter_map(|b| b.into_iter().next()).collect())
		}
		Fields::Some(fs) => fs,
	};
	let mut out = Vec::new();
	for key in order {
		let bucket = buckets.remove(&key).unwrap_or_default();
		let first_doc = crate::sql::DocContext {
			after: bucket.first().cloned().unwrap_or(Value::None),
			..Default::default()
		};
		let mut obj = Object::default();
		for f in fs {
			match f {
				Field::Value {
					alias,
					expr,
				} => {
					obj.0.insert(alias.clone(), expr.compute(&first_doc)?);
				}
				Field::Aggregate {
					alias,
					func,
					path,
				} => {
					obj.0.insert(alias.clone(), aggregate(&bucket, *func, path));
				}
			}
		}
		out.push(Value::Object(obj));
	}
	Ok(out)
}

fn aggregate(bucket: &[Value], func: AggFn, path: &str) -> Value {
	let nums: Vec<Number> = bucket
		.iter()
		.filter_map(|v| match v.get(path) {
			Value::Number(n) => Some(n),
			_ => None,
		})
		.collect();
	match func {
		AggFn::Count => Value::Number(Number::Int(bucket.len() as i64)),
		AggFn::Sum => Value::Number(nums.into_iter().fold(Number::Int(0), |a, b| a + b)),
		AggFn::Mean => {
			if nums.is_empty() {
				Value::Number(Number::Int(0))
			} else {
				let len = Decimal::from(nums.len() as i64);
				let sum = nums.into_iter().fold(Number::Int(0), |a, b| a + b);
				Value::Number(Number::Decimal(sum.as_decimal() / len))
			}
		}
		AggFn::Min => nums.into_iter().min().map(Value::Number).unwrap_or(Value::None),
		AggFn::Max => nums.into_iter().max().map(Value::Number).unwrap_or(Value::None),
	}
}

fn order_cmp(a: &Value, b: &Value, order: &[(crate::sql::Expr, bool)]) -> Ordering {
	let da = crate::sql::DocContext {
		after: a.clone(),
		..Default::default()
	};
	let db = crate::sql::DocContext {
		after: b.clone(),
		..Default::default()
	};
	for (expr, asc) in order {
		let va = expr.compute(&da).unwrap_or(Value::None);
		let vb = expr.compute(&db).unwrap_or(Value::None);
		let ord = compare_values(&va, &vb);
		let ord = if *asc {
			ord
		} else {
			ord.reverse()
		};
		if ord != Ordering::Equal {
			return ord;
		}
	}
	Ordering::Equal
}

/// A mutation statement's effective target list, used by the executor to
/// drive `check_tables`/`resolve_targets`/`run` uniformly across
/// SELECT/CREATE/UPDATE/UPSERT/DELETE/INSERT/RELATE.
pub(crate) fn statement_what(stmt: &Statement) -> Vec<What> {
	match stmt {
		Statement::Select(s) => s.what.clone(),
		Statement::Create(c) | Statement::Update(c) | Statement::Upsert(c) => c.what.clone(),
		Statement::Delete(d) => d.common.what.clone(),
		Statement::Insert(i) => vec![What::Table(i.into.clone())],
		Statement::Relate(r) => vec![r.from.clone(), r.to.clone()],
		_ => Vec::new(),
	}
}

pub(crate) fn statement_kind(stmt: &Statement) -> StatementKind {
	match stmt {
		Statement::Select(_) => StatementKind::Select,
		Statement::Create(_) => StatementKind::Create,
		Statement::Update(_) => StatementKind::Update,
		Statement::Upsert(_) => StatementKind::Upsert,
		Statement::Delete(_) => StatementKind::Delete,
		Statement::Insert(_) => StatementKind::Insert,
		Statement::Relate(_) => StatementKind::Relate,
		_ => StatementKind::Select,
	}
}

pub(crate) fn statement_common(stmt: &Statement) -> Option<MutateCommon> {
	match stmt {
		Statement::Create(c) | Statement::Update(c) | Statement::Upsert(c) => Some(c.clone()),
		Statement::Delete(d) => Some(d.common.clone()),
		_ => None,
	}
}

pub(crate) fn statement_output(stmt: &Statement) -> Echo {
	match stmt {
		Statement::Select(_) => Echo::Full,
		Statement::Create(c) | Statement::Update(c) | Statement::Upsert(c) => c.output,
		Statement::Delete(d) => d.common.output,
		Statement::Insert(i) => i.output,
		Statement::Relate(r) => r.output,
		_ => Echo::None,
	}
}
