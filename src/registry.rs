use std::collections::HashMap;

use crate::descriptor::ErasedDescriptor;
use crate::error::CoroutineError;
use crate::ident::Identifier;

/// Catalog of generator descriptors keyed by [`Identifier`].
///
/// This is the sole source of truth [`SnapshotEngine`](crate::snapshot::SnapshotEngine)
/// consults — it never reasons about a generator's internal layout itself.
#[derive(Default)]
pub struct GeneratorRegistry {
	descriptors: HashMap<Identifier, Box<dyn ErasedDescriptor>>,
}

impl GeneratorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a descriptor under its own `id()`.
	///
	/// # Errors
	/// `DuplicateDescriptor`-shaped [`CoroutineError::InvalidArgument`] if
	/// the id is already bound.
	pub fn register(&mut self, descriptor: Box<dyn ErasedDescriptor>) -> Result<(), CoroutineError> {
		let id = descriptor.id().clone();
		if self.descriptors.contains_key(&id) {
			return Err(CoroutineError::InvalidArgument(format!(
				"duplicate descriptor for {id}"
			)));
		}
		self.descriptors.insert(id, descriptor);
		Ok(())
	}

	pub fn lookup(&self, id: &Identifier) -> Result<&dyn ErasedDescriptor, CoroutineError> {
		self.descriptors
			.get(id)
			.map(|d| d.as_ref())
			.ok_or_else(|| CoroutineError::UnknownGenerator(id.clone()))
	}

	pub fn contains(&self, id: &Identifier) -> bool {
		self.descriptors.contains_key(id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::action::{CoroutineAction, CoroutineGenerator, StepOutcome};
	use crate::descriptor::GeneratorDescriptor;
	use std::any::Any;

	struct Noop(Identifier, i32);

	impl CoroutineGenerator for Noop {
		fn method_id(&self) -> &Identifier {
			&self.0
		}
		fn advance(&mut self) -> StepOutcome {
			StepOutcome::Yielded(CoroutineAction::NullYield)
		}
		fn as_any(&self) -> &dyn Any {
			self
		}
		fn as_any_mut(&mut self) -> &mut dyn Any {
			self
		}
	}

	fn make_descriptor(id: Identifier) -> Box<dyn ErasedDescriptor> {
		let id2 = id.clone();
		Box::new(
			GeneratorDescriptor::builder(id, move |s| Noop(id2.clone(), s), |g| g.1, |g, s| g.1 = s).build(),
		)
	}

	#[test]
	fn duplicate_registration_fails() {
		let mut reg = GeneratorRegistry::new();
		let id = Identifier::new("Noop");
		reg.register(make_descriptor(id.clone())).unwrap();
		let err = reg.register(make_descriptor(id)).unwrap_err();
		assert!(matches!(err, CoroutineError::InvalidArgument(_)));
	}

	#[test]
	fn lookup_of_unregistered_id_fails() {
		let reg = GeneratorRegistry::new();
		let err = reg.lookup(&Identifier::new("Missing")).unwrap_err();
		assert!(matches!(err, CoroutineError::UnknownGenerator(_)));
	}
}
