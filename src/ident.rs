use std::any::type_name;
use std::fmt;

/// A stable identifier for a registered generator method: an optional
/// declaring-scope namespace plus a method name. Identifier equality is
/// purely structural (two identifiers built from the same strings are
/// equal regardless of how they were constructed).
///
/// Deliberately avoids recovering identity by parsing compiler-mangled
/// symbol names (`<>1__state`, `<>4__this`, ...) at runtime: callers register
/// an `Identifier` explicitly, so the registry never has to reverse-engineer
/// one from a generator's layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identifier {
	pub namespace: Option<String>,
	pub method: String,
}

impl Identifier {
	/// Build an identifier with no declaring-scope namespace.
	pub fn new(method: impl Into<String>) -> Self {
		Self {
			namespace: None,
			method: method.into(),
		}
	}

	/// Build a namespaced identifier, e.g. `("game::enemies", "patrol")`.
	pub fn namespaced(namespace: impl Into<String>, method: impl Into<String>) -> Self {
		Self {
			namespace: Some(namespace.into()),
			method: method.into(),
		}
	}
}

impl fmt::Display for Identifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.namespace {
			Some(ns) => write!(f, "{ns}::{}", self.method),
			None => write!(f, "{}", self.method),
		}
	}
}

/// Derives an [`Identifier`] from a Rust type's `std::any::type_name`,
/// splitting off the last path segment as the method name and the rest as
/// the namespace.
///
/// A convenience for deriving an identifier straight from an existing
/// language-level generator type — never required: callers are always free
/// to pick their own `Identifier` via [`Identifier::new`] or
/// [`Identifier::namespaced`].
pub fn derive_identifier<T: ?Sized>() -> Identifier {
	let full = type_name::<T>();
	match full.rsplit_once("::") {
		Some((namespace, method)) => Identifier::namespaced(namespace, method),
		None => Identifier::new(full),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Foo;

	#[test]
	fn derive_identifier_splits_module_path() {
		let id = derive_identifier::<Foo>();
		assert_eq!(id.method, "Foo");
		assert!(id.namespace.unwrap().ends_with("ident::tests"));
	}

	#[test]
	fn structural_equality() {
		let a = Identifier::namespaced("ns", "m");
		let b = Identifier::namespaced("ns", "m");
		assert_eq!(a, b);
	}
}
