//! A query execution core over a transactional, ordered key-value store:
//! statement sequencing and explicit transactions (dbs::Executor), per-
//! statement target resolution and worker dispatch (dbs::iterator), and
//! per-record document processing with schema enforcement, index
//! maintenance and event firing (doc).
//!
//! There is no SurrealQL parser here -- callers (and this crate's own tests)
//! build [`sql::Statement`] values directly.

#[macro_use]
extern crate tracing;

pub mod cnf;
pub(crate) mod ctx;
pub mod dbs;
mod doc;
pub mod err;
pub(crate) mod key;
pub(crate) mod kvs;
pub mod sql;

pub use dbs::{AuthLevel, Executor, Response, Session, Status};
pub use kvs::Datastore;
