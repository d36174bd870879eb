use crate::err::Error;
use crate::sql::Value;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The response status taxonomy (spec.md §4.5, §7): every statement
/// resolves to exactly one of these, never a bare `Err`/`Ok` bool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
	Ok,
	Err,
	ErrDb,
	ErrKv,
	ErrPe,
	ErrFd,
	ErrIx,
	ErrTb,
}

/// One statement's result, with the wall-clock time it took to run
/// (spec.md §4.5).
#[derive(Debug)]
pub struct Response {
	pub time: Duration,
	pub result: Result<Value, Error>,
}

impl Response {
	pub fn status(&self) -> Status {
		match &self.result {
			Ok(_) => Status::Ok,
			Err(e) => e.status(),
		}
	}

	pub fn speed(&self) -> String {
		format!("{:?}", self.time)
	}

	pub fn output(self) -> Result<Value, Error> {
		self.result
	}
}
