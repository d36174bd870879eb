//! Stores a record document.
use crate::key::KeyCategory;
use crate::sql::Id;
use serde::{Deserialize, Serialize};

/// Field order doubles as the on-disk byte layout: `storekey` serializes a
/// struct as the concatenation of its fields in declaration order, and a
/// `String` field is written as raw UTF-8 followed by a NUL terminator. The
/// single-byte `_sep*` fields are the literal `/`/`*` separators the teacher
/// crate's `#[derive(Key)]` macro would otherwise generate -- see
/// `examples/surrealdb-surrealdb/core/src/key/thing/mod.rs`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thing {
	_sep0: u8,
	_sep1: u8,
	pub ns: String,
	_sep2: u8,
	pub db: String,
	_sep3: u8,
	pub tb: String,
	_sep4: u8,
	pub id: Id,
}

impl Thing {
	pub fn new(ns: impl Into<String>, db: impl Into<String>, tb: impl Into<String>, id: Id) -> Self {
		Thing {
			_sep0: b'/',
			_sep1: b'*',
			ns: ns.into(),
			_sep2: b'*',
			db: db.into(),
			_sep3: b'*',
			tb: tb.into(),
			_sep4: b'*',
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
		KeyCategory::Thing
	}
}

pub fn prefix(ns: &str, db: &str, tb: &str) -> Vec<u8> {
	let mut k = super::table::all(ns, db, tb);
	k.push(b'*');
	k.push(0x00);
	k
}

pub fn suffix(ns: &str, db: &str, tb: &str) -> Vec<u8> {
	let mut k = super::table::all(ns, db, tb);
	k.push(b'*');
	k.push(0xff);
	k
}
