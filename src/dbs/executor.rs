//! The statement-sequence driver (spec.md C5): owns the nullable active
//! transaction, buffers responses across an explicit `BEGIN .. COMMIT`
//! block, and classifies every statement's outcome onto the response status
//! taxonomy.
use crate::cnf;
use crate::ctx::{Context, MutableContext};
use crate::dbs::iterator::{self, Operable, Processed};
use crate::dbs::options::Options;
use crate::dbs::response::Response;
use crate::dbs::session::Session;
use crate::doc::Document;
use crate::err::Error;
use crate::kvs::{Datastore, SharedTransaction};
use crate::sql::{Define, Query, Statement, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct Executor {
	kvs: Arc<Datastore>,
	session: Session,
}

/// Per-query mutable state threaded across statements: the active
/// transaction (if inside `BEGIN .. COMMIT`), its buffered responses, and
/// whether any buffered statement has already failed (spec.md §4.5 step 4).
struct TxState {
	handle: SharedTransaction,
	buffer: Vec<Response>,
	failed: bool,
}

impl Executor {
	pub fn new(kvs: Arc<Datastore>, session: Session) -> Self {
		Executor {
			kvs,
			session,
		}
	}

	fn options(&self) -> Options {
		Options::new()
			.with_ns(self.session.ns.clone().map(Arc::from))
			.with_db(self.session.db.clone().map(Arc::from))
			.with_auth(self.session.au.clone())
	}

	/// Runs every statement in `query` in source order, returning one
	/// response per statement except where an explicit transaction collapses
	/// several into one flush (spec.md §4.5, §6.3).
	#[tracing::instrument(skip_all)]
	pub async fn execute(&self, query: Query) -> Vec<Response> {
		let mut root = MutableContext::background().freeze();
		let opt = self.options();
		let mut state: Option<TxState> = None;
		let mut out = Vec::new();

		for stmt in query {
			match stmt {
				Statement::Begin => {
					self.handle_begin(&mut state, &mut out).await;
				}
				Statement::Cancel => {
					self.handle_cancel(&mut state, &mut out).await;
				}
				Statement::Commit => {
					self.handle_commit(&mut state, &mut out).await;
				}
				Statement::Set {
					name,
					value,
				} => {
					// `LET` rebinds the context every later statement in this
					// query is dispatched with (spec.md §6.1).
					let doc = crate::sql::DocContext {
						vars: root.vars(),
						..Default::default()
					};
					match value.compute(&doc) {
						Ok(v) => {
							let mut child = MutableContext::new(&root);
							child.add_value(name, v);
							root = child.freeze();
							self.push_response(&mut state, &mut out, ok(Value::None));
						}
						Err(e) => self.push_response(&mut state, &mut out, err(e)),
					}
				}
				Statement::Output(expr) if state.is_some() => {
					// RETURN inside a transaction collapses every response
					// buffered so far to this single result (spec.md §4.5
					// step 2); COMMIT later flushes just this one entry.
					let tx_state = state.as_mut().unwrap();
					let doc = crate::sql::DocContext {
						vars: root.vars(),
						..Default::default()
					};
					let result = expr.compute(&doc);
					tx_state.failed = result.is_err();
					tx_state.buffer = vec![Response {
						time: Duration::ZERO,
						result,
					}];
				}
				other => {
					self.dispatch(&root, &opt, &mut state, other, &mut out).await;
				}
			}
		}

		// An unterminated transaction at end of query never reaches the KV
		// store: discard it and surface its buffered responses as-is.
		if let Some(tx_state) = state.take() {
			let mut guard = tx_state.handle.lock().await;
			let _ = guard.cancel().await;
			drop(guard);
			out.extend(tx_state.buffer);
		}
		out
	}

	async fn handle_begin(&self, state: &mut Option<TxState>, out: &mut Vec<Response>) {
		if state.is_some() {
			out.push(ok(Value::None));
			return;
		}
		match self.kvs.transaction(true).await {
			Ok(tx) => {
				*state = Some(TxState {
					handle: Arc::new(Mutex::new(tx)),
					buffer: Vec::new(),
					failed: false,
				});
				out.push(ok(Value::None));
			}
			Err(e) => out.push(err(e)),
		}
	}

	async fn handle_cancel(&self, state: &mut Option<TxState>, out: &mut Vec<Response>) {
		let Some(tx_state) = state.take() else {
			out.push(err(Error::Internal("CANCEL without an active transaction".into())));
			return;
		};
		let mut guard = tx_state.handle.lock().await;
		let _ = guard.cancel().await;
		drop(guard);
		for resp in tx_state.buffer {
			out.push(Response {
				time: resp.time,
				result: Err(Error::QueryCancelled),
			});
		}
		out.push(ok(Value::None));
	}

	async fn handle_commit(&self, state: &mut Option<TxState>, out: &mut Vec<Response>) {
		let Some(tx_state) = state.take() else {
			out.push(err(Error::Internal("COMMIT without an active transaction".into())));
			return;
		};
		if tx_state.failed {
			let mut guard = tx_state.handle.lock().await;
			let _ = guard.cancel().await;
			drop(guard);
			for resp in tx_state.buffer {
				// A statement that itself succeeded never ran to commit --
				// the transaction it was buffered under got rolled back --
				// so its response must be rewritten to an error too
				// (spec.md §4.5; mirrors `handle_cancel` above).
				let result = match resp.result {
					Ok(_) => Err(Error::QueryNotExecuted),
					Err(e) => Err(e),
				};
				out.push(Response {
					time: resp.time,
					result,
				});
			}
			out.push(err(Error::QueryNotExecuted));
			return;
		}
		let mut guard = tx_state.handle.lock().await;
		let commit_result = guard.commit().await;
		drop(guard);
		match commit_result {
			Ok(()) => {
				out.extend(tx_state.buffer);
				out.push(ok(Value::None));
			}
			Err(e) => {
				warn!("commit failed, rolling buffered responses back to ERR: {e}");
				for _ in &tx_state.buffer {
					out.push(err(Error::QueryNotExecutedDetail {
						message: e.to_string(),
					}));
				}
				out.push(err(e));
			}
		}
	}

	/// Runs exactly one non-transaction-control statement (spec.md §4.5
	/// step 3), opening and closing a local transaction around it unless one
	/// is already active.
	async fn dispatch(&self, root: &Context, opt: &Options, state: &mut Option<TxState>, stmt: Statement, out: &mut Vec<Response>) {
		if let Some(tx_state) = state.as_ref() {
			if tx_state.failed {
				let resp = Response {
					time: Duration::ZERO,
					result: Err(Error::QueryNotExecuted),
				};
				state.as_mut().unwrap().buffer.push(resp);
				return;
			}
		}

		let local_tx = if state.is_none() {
			match self.kvs.transaction(stmt.writeable()).await {
				Ok(tx) => Some(Arc::new(Mutex::new(tx))),
				Err(e) => {
					self.push_response(state, out, Response {
						time: Duration::ZERO,
						result: Err(e),
					});
					return;
				}
			}
		} else {
			None
		};
		let handle = local_tx.clone().unwrap_or_else(|| state.as_ref().unwrap().handle.clone());

		let mut ctx = MutableContext::new(root);
		ctx.set_transaction(handle.clone());
		if let Some(timeout) = stmt.timeout() {
			if ctx.add_timeout(timeout).is_err() {
				self.push_response(state, out, Response {
					time: Duration::ZERO,
					result: Err(Error::Internal("timeout overflowed".into())),
				});
				return;
			}
		}
		let ctx = ctx.freeze();

		debug!("dispatching statement: {stmt:?}");
		let started = Instant::now();
		let result = run_statement(&ctx, opt, &stmt).await;
		let elapsed = started.elapsed();

		if let Some(handle) = local_tx {
			let mut guard = handle.lock().await;
			let _ = if result.is_ok() {
				guard.commit().await
			} else {
				guard.cancel().await
			};
		}

		let resp = Response {
			time: elapsed,
			result,
		};
		if resp.result.is_err() {
			if let Some(tx_state) = state.as_mut() {
				tx_state.failed = true;
			}
		}
		self.push_response(state, out, resp);
	}

	fn push_response(&self, state: &mut Option<TxState>, out: &mut Vec<Response>, resp: Response) {
		match state.as_mut() {
			Some(tx_state) => tx_state.buffer.push(resp),
			None => out.push(resp),
		}
	}
}

fn ok(v: Value) -> Response {
	Response {
		time: Duration::ZERO,
		result: Ok(v),
	}
}

fn err(e: Error) -> Response {
	Response {
		time: Duration::ZERO,
		result: Err(e),
	}
}

/// Dispatches one already-resolved statement to its target-resolution and
/// worker-pool run, producing the single `Value` a response carries
/// (spec.md §4.5 step 3, §4.6). Shared by the top-level per-statement
/// dispatch above, `IF/ELSE` branch execution, and C8's event/subquery
/// re-entry.
#[tracing::instrument(skip_all)]
pub(crate) async fn run_statement(ctx: &Context, opt: &Options, stmt: &Statement) -> Result<Value, Error> {
	ctx.check_done()?;
	match stmt {
		Statement::Use {
			..
		} => Ok(Value::None),
		Statement::Set {
			..
		} => Ok(Value::None),
		Statement::Begin | Statement::Cancel | Statement::Commit => Ok(Value::None),
		Statement::Output(expr) => expr.compute(&crate::sql::DocContext {
			vars: ctx.vars(),
			..Default::default()
		}),
		Statement::IfElse {
			branches,
			close,
		} => run_if_else(ctx, opt, branches, close).await,
		Statement::Define(def) => run_define(ctx, opt, def).await,
		Statement::Select(_) | Statement::Create(_) | Statement::Update(_) | Statement::Upsert(_) | Statement::Delete(_) => {
			run_mutation(ctx, opt, stmt).await
		}
		Statement::Insert(i) => run_insert(ctx, opt, i).await,
		Statement::Relate(r) => run_relate(ctx, opt, r).await,
	}
}

async fn run_mutation(ctx: &Context, opt: &Options, stmt: &Statement) -> Result<Value, Error> {
	let what = iterator::statement_what(stmt);
	let kind = iterator::statement_kind(stmt);
	let virtual_run = iterator::statement_common(stmt).map(|c| c.virtual_run).unwrap_or(false);
	iterator::check_tables(ctx, opt, kind, &what, virtual_run).await?;
	let targets = iterator::resolve_targets(ctx, opt, &what, kind).await?;
	let rows = iterator::run(ctx, opt, stmt, targets).await?;
	Ok(Value::from(rows))
}

async fn run_insert(ctx: &Context, opt: &Options, stmt: &crate::sql::InsertStatement) -> Result<Value, Error> {
	iterator::check_tables(ctx, opt, crate::sql::StatementKind::Insert, &[crate::sql::What::Table(stmt.into.clone())], false)
		.await?;
	let mut rows = Vec::with_capacity(stmt.data.len());
	for data in &stmt.data {
		let rid = crate::sql::Thing::new(stmt.into.clone(), crate::sql::Id::rand());
		let processed = Processed {
			rid,
			val: Operable::Fetch,
		};
		let create = Statement::Create(crate::sql::MutateCommon {
			what: vec![],
			data: Some(data.clone()),
			cond: None,
			output: stmt.output,
			timeout: stmt.timeout,
			virtual_run: false,
		});
		if let Some(v) = Document::run(ctx, opt, &create, processed).await? {
			rows.push(v);
		}
	}
	Ok(Value::from(rows))
}

/// `RELATE from -> kind -> to`: every `(from, to)` pair resolved from the
/// two endpoint targets produces one edge record on `kind`, carrying `in`/
/// `out` plus whatever the statement's own `Data` clause contributes. Set-
/// style assignments in that clause are not supported here (an edge's
/// `in`/`out` always win); only `CONTENT`/`MERGE` bodies are folded in,
/// which covers the common RELATE usage (documented simplification).
async fn run_relate(ctx: &Context, opt: &Options, stmt: &crate::sql::RelateStatement) -> Result<Value, Error> {
	let from_targets = iterator::resolve_targets(ctx, opt, std::slice::from_ref(&stmt.from), crate::sql::StatementKind::Select).await?;
	let to_targets = iterator::resolve_targets(ctx, opt, std::slice::from_ref(&stmt.to), crate::sql::StatementKind::Select).await?;

	let mut rows = Vec::new();
	for f in &from_targets {
		for t in &to_targets {
			let rid = crate::sql::Thing::new(stmt.kind.clone(), crate::sql::Id::rand());
			let in_val = Value::Thing(f.rid.clone());
			let out_val = Value::Thing(t.rid.clone());
			let user = stmt.data.clone();
			let data = Some(crate::sql::Data::Merge(crate::sql::Expr::closure(move |doc| {
				let mut obj = crate::sql::Object::default();
				obj.0.insert("in".to_string(), in_val.clone());
				obj.0.insert("out".to_string(), out_val.clone());
				let mut result = Value::Object(obj);
				if let Some(crate::sql::Data::Content(e) | crate::sql::Data::Merge(e)) = &user {
					result.merge(e.compute(doc)?);
				}
				Ok(result)
			})));
			let processed = Processed {
				rid,
				val: Operable::Fetch,
			};
			let create = Statement::Create(crate::sql::MutateCommon {
				what: vec![],
				data,
				cond: None,
				output: stmt.output,
				timeout: stmt.timeout,
				virtual_run: false,
			});
			if let Some(v) = Document::run(ctx, opt, &create, processed).await? {
				rows.push(v);
			}
		}
	}
	Ok(Value::from(rows))
}

async fn run_if_else(ctx: &Context, opt: &Options, branches: &[(crate::sql::Expr, Query)], close: &Option<Query>) -> Result<Value, Error> {
	let doc = crate::sql::DocContext {
		vars: ctx.vars(),
		..Default::default()
	};
	for (cond, body) in branches {
		if cond.compute(&doc)?.is_truthy() {
			return run_nested_single(ctx, opt, body).await;
		}
	}
	match close {
		Some(body) => run_nested_single(ctx, opt, body).await,
		None => Ok(Value::None),
	}
}

async fn run_nested_single(ctx: &Context, opt: &Options, body: &Query) -> Result<Value, Error> {
	let rows = run_nested_rows(ctx, opt, body).await?;
	Ok(rows.into_iter().last().unwrap_or(Value::None))
}

/// Runs a nested query body (an `IF/ELSE` branch or a `Subquery` target) in
/// the current transaction, returning every statement's result in order.
/// Used by `run_if_else` and by C6's `Subquery` target resolution.
pub(crate) async fn run_nested_rows(ctx: &Context, opt: &Options, body: &Query) -> Result<Vec<Value>, Error> {
	if ctx.depth() >= *cnf::MAX_RECURSIVE_QUERIES {
		return Err(Error::RecursiveOverload);
	}
	let mut child = MutableContext::enter(ctx);
	child.set_transaction(ctx.tx());
	let child = child.freeze();
	let mut out = Vec::new();
	for stmt in body {
		out.push(run_statement(&child, opt, stmt).await?);
	}
	Ok(out)
}

async fn run_define(ctx: &Context, opt: &Options, def: &Define) -> Result<Value, Error> {
	let ns = opt.ns()?.to_string();
	let db = opt.db()?.to_string();
	let mut tx = ctx.tx().lock_owned().await;
	match def {
		Define::Table(d) => tx.define_table(&ns, &db, d.clone()).await?,
		Define::Field(tb, d) => tx.define_field(&ns, &db, tb, d.clone()).await?,
		Define::Index(tb, d) => tx.define_index(&ns, &db, tb, d.clone()).await?,
		Define::Event(tb, d) => tx.define_event(&ns, &db, tb, d.clone()).await?,
	}
	Ok(Value::None)
}
