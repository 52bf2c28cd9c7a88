use indexmap::IndexMap;

/// A neutral payload used for yielded values, arguments, hoisted locals, the
/// captured receiver, and thread tags.
///
/// `Value` is deliberately not generic: spec-wise it stands in for "whatever
/// the configured wire-format collaborator can round-trip" (see the crate
/// docs for `snapshot`). The core never interprets a `Value` beyond moving
/// it between a live generator and a `FrameSnapshot`.
///
/// Enable the `serde` feature to derive `Serialize`/`Deserialize` so a host
/// can hand a captured snapshot straight to a serializer of its choosing;
/// the core itself does not depend on any wire format.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Bytes(Vec<u8>),
	List(Vec<Value>),
	Map(IndexMap<String, Value>),
}

impl Value {
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Value::Float(v) => Some(*v),
			Value::Int(v) => Some(*v as f64),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(v) => Some(v),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}
}

impl Default for Value {
	fn default() -> Self {
		Value::Null
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Text(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Text(v.to_owned())
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

/// Argument/local field maps. Order-preserving so that round-tripping a
/// `FrameSnapshot` is deterministic to assert against in tests without
/// sorting keys first.
pub type FieldMap = IndexMap<String, Value>;
