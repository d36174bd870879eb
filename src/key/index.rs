//! Stores a single index entry: the indexed column values, mapped back to
//! the record id that produced them.
use crate::key::KeyCategory;
use crate::sql::{Array, Id};
use serde::{Deserialize, Serialize};

/// Same field-order-is-byte-layout convention as `key::thing::Thing`: every
/// `String` field is raw UTF-8 plus a NUL terminator, every `_sep*` field a
/// literal separator byte, and `fd`/`id` serialize positionally through
/// their own `Serialize` impls with no extra framing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Index {
	_sep0: u8,
	_sep1: u8,
	pub ns: String,
	_sep2: u8,
	pub db: String,
	_sep3: u8,
	pub tb: String,
	_sep4: u8,
	pub ix: String,
	_sep5: u8,
	pub fd: Array,
	pub id: Option<Id>,
}

impl Index {
	pub fn new(
		ns: impl Into<String>,
		db: impl Into<String>,
		tb: impl Into<String>,
		ix: impl Into<String>,
		fd: Array,
		id: Option<Id>,
	) -> Self {
		Index {
			_sep0: b'/',
			_sep1: b'*',
			ns: ns.into(),
			_sep2: b'*',
			db: db.into(),
			_sep3: b'*',
			tb: tb.into(),
			_sep4: b'+',
			ix: ix.into(),
			_sep5: b'*',
			fd,
			id,
		}
	}

	pub fn encode(&self) -> Result<Vec<u8>, crate::err::Error> {
		super::encode(self)
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, crate::err::Error> {
		super::decode(bytes)
	}

	pub fn key_category() -> KeyCategory {
		KeyCategory::Index
	}
}

pub fn prefix(ns: &str, db: &str, tb: &str, ix: &str) -> Vec<u8> {
	let mut k = super::table::all(ns, db, tb);
	k.push(b'+');
	k.extend_from_slice(ix.as_bytes());
	k.push(0x00);
	k.push(b'*');
	k
}

pub fn suffix(ns: &str, db: &str, tb: &str, ix: &str) -> Vec<u8> {
	let mut k = prefix(ns, db, tb, ix);
	k.push(0xff);
	k
}

/// The prefix of all entries carrying exactly this column-value tuple; used
/// to scan for a unique-index collision before an insert.
pub fn prefix_for_values(ns: &str, db: &str, tb: &str, ix: &str, fd: &Array) -> Result<Vec<u8>, crate::err::Error> {
	let mut k = prefix(ns, db, tb, ix);
	k.extend_from_slice(&super::encode(fd)?);
	Ok(k)
}
