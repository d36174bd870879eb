use crate::sql::Id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete record address: `(table, id)` (spec.md Glossary).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thing {
	pub tb: String,
	pub id: Id,
}

impl Thing {
	pub fn new(tb: impl Into<String>, id: impl Into<Id>) -> Self {
		Thing {
			tb: tb.into(),
			id: id.into(),
		}
	}
}

impl PartialEq for Thing {
	fn eq(&self, other: &Self) -> bool {
		self.tb == other.tb && self.id == other.id
	}
}
impl Eq for Thing {}

impl fmt::Display for Thing {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}:{}", self.tb, self.id)
	}
}
