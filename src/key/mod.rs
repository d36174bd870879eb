//! Hierarchical, order-preserving key encodings.
//!
//! Every key type is a plain struct whose fields are serialized in
//! declaration order by [`storekey`], with single-byte sentinel fields
//! marking the boundaries between path segments. Because `storekey`
//! preserves the byte ordering of serialized values, encoding two keys and
//! comparing the resulting bytes gives the same ordering as comparing the
//! structs field-by-field -- which is what makes `range(prefix, suffix)`
//! scans over a key family work.
//!
//! The teacher crate generates these structs with a `#[derive(Key)]` macro;
//! that macro isn't part of the dependency stack here, so encode/decode are
//! implemented directly against `storekey` on each type.
//!
//! Only record data (`thing`) and secondary index entries (`index`) live in
//! the KV store; namespace/database/table/field/event catalog entries are
//! process-wide in-memory state (`kvs::catalog`) because field and event
//! definitions embed a closure (`sql::Expr::Closure`) that can't round-trip
//! through `serde`. There is accordingly no catalog-entry key family here --
//! `table` contributes only the shared table-scoped key prefix `thing` and
//! `index` build on.

mod table;
pub mod index;
pub mod thing;

use crate::err::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode<T: Serialize>(key: &T) -> Result<Vec<u8>, Error> {
	storekey::serialize(key).map_err(|e| Error::Kv(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
	storekey::deserialize(bytes).map_err(|e| Error::Kv(e.to_string()))
}

/// What kind of data entry a key identifies. Used for error messages and
/// diagnostics, never for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCategory {
	Thing,
	Index,
}
