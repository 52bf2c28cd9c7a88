use crate::action::CoroutineGenerator;
use crate::ident::Identifier;
use crate::value::{FieldMap, Value};

/// The fields a descriptor reads off (or writes onto) a live generator via
/// its `introspect`/`instantiate` accessors.
#[derive(Clone, Debug)]
pub struct CapturedFields {
	pub state: i32,
	pub current: Option<Value>,
	pub receiver: Option<Value>,
	pub args: FieldMap,
	pub locals: FieldMap,
}

type Getter<G, T> = Box<dyn Fn(&G) -> T>;
type Setter<G, T> = Box<dyn Fn(&mut G, T)>;

struct FieldAccessor<G> {
	name: String,
	get: Getter<G, Value>,
	set: Setter<G, Value>,
}

/// Per-method metadata bridging a concrete generator type `G` to the neutral
/// [`CapturedFields`] record: a factory plus explicit getter/setter
/// accessors for state, current, optional receiver, each named argument, and
/// each hoisted local.
///
/// Built with [`GeneratorDescriptor::builder`].
pub struct GeneratorDescriptor<G> {
	id: Identifier,
	factory: Box<dyn Fn(i32) -> G>,
	get_state: Getter<G, i32>,
	set_state: Setter<G, i32>,
	get_current: Getter<G, Option<Value>>,
	set_current: Setter<G, Option<Value>>,
	get_receiver: Getter<G, Option<Value>>,
	set_receiver: Setter<G, Option<Value>>,
	args: Vec<FieldAccessor<G>>,
	locals: Vec<FieldAccessor<G>>,
}

impl<G: CoroutineGenerator + 'static> GeneratorDescriptor<G> {
	pub fn builder(
		id: Identifier,
		factory: impl Fn(i32) -> G + 'static,
		get_state: impl Fn(&G) -> i32 + 'static,
		set_state: impl Fn(&mut G, i32) + 'static,
	) -> GeneratorDescriptorBuilder<G> {
		GeneratorDescriptorBuilder {
			inner: GeneratorDescriptor {
				id,
				factory: Box::new(factory),
				get_state: Box::new(get_state),
				set_state: Box::new(set_state),
				get_current: Box::new(|_| None),
				set_current: Box::new(|_, _| {}),
				get_receiver: Box::new(|_| None),
				set_receiver: Box::new(|_, _| {}),
				args: Vec::new(),
				locals: Vec::new(),
			},
		}
	}
}

pub struct GeneratorDescriptorBuilder<G> {
	inner: GeneratorDescriptor<G>,
}

impl<G: CoroutineGenerator + 'static> GeneratorDescriptorBuilder<G> {
	pub fn current(
		mut self,
		get: impl Fn(&G) -> Option<Value> + 'static,
		set: impl Fn(&mut G, Option<Value>) + 'static,
	) -> Self {
		self.inner.get_current = Box::new(get);
		self.inner.set_current = Box::new(set);
		self
	}

	pub fn receiver(
		mut self,
		get: impl Fn(&G) -> Option<Value> + 'static,
		set: impl Fn(&mut G, Option<Value>) + 'static,
	) -> Self {
		self.inner.get_receiver = Box::new(get);
		self.inner.set_receiver = Box::new(set);
		self
	}

	pub fn arg(
		mut self,
		name: impl Into<String>,
		get: impl Fn(&G) -> Value + 'static,
		set: impl Fn(&mut G, Value) + 'static,
	) -> Self {
		self.inner.args.push(FieldAccessor {
			name: name.into(),
			get: Box::new(get),
			set: Box::new(set),
		});
		self
	}

	pub fn local(
		mut self,
		name: impl Into<String>,
		get: impl Fn(&G) -> Value + 'static,
		set: impl Fn(&mut G, Value) + 'static,
	) -> Self {
		self.inner.locals.push(FieldAccessor {
			name: name.into(),
			get: Box::new(get),
			set: Box::new(set),
		});
		self
	}

	pub fn build(self) -> GeneratorDescriptor<G> {
		self.inner
	}
}

/// Object-safe face of [`GeneratorDescriptor`], so a [`GeneratorRegistry`]
/// (crate::registry) can hold heterogeneous descriptors behind one map.
pub trait ErasedDescriptor {
	fn id(&self) -> &Identifier;

	/// Builds a fresh generator from captured fields, applying each setter
	/// in turn. Keys in `args`/`locals` that this descriptor does not
	/// declare are silently ignored by default; declared fields missing from
	/// the map keep whatever default the freshly-constructed generator
	/// already has.
	fn instantiate(&self, fields: &CapturedFields) -> Box<dyn CoroutineGenerator>;

	/// Reads every declared field off a live generator of this descriptor's
	/// type. Returns `None` if `gen`'s concrete type does not match (the
	/// registry should never call this on a mismatched generator, but the
	/// signature stays honest about the possibility).
	fn introspect(&self, gen: &dyn CoroutineGenerator) -> Option<CapturedFields>;

	/// The argument/local names this descriptor recognizes, for strict-mode
	/// rehydration, which raises `SchemaMismatch` on an unrecognized key
	/// instead of dropping it.
	fn known_fields(&self) -> Vec<&str>;
}

impl std::fmt::Debug for dyn ErasedDescriptor + '_ {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ErasedDescriptor").field("id", self.id()).finish()
	}
}

impl<G: CoroutineGenerator + 'static> ErasedDescriptor for GeneratorDescriptor<G> {
	fn id(&self) -> &Identifier {
		&self.id
	}

	fn instantiate(&self, fields: &CapturedFields) -> Box<dyn CoroutineGenerator> {
		let mut gen = (self.factory)(fields.state);
		(self.set_current)(&mut gen, fields.current.clone());
		(self.set_receiver)(&mut gen, fields.receiver.clone());
		for accessor in &self.args {
			if let Some(v) = fields.args.get(&accessor.name) {
				(accessor.set)(&mut gen, v.clone());
			}
		}
		for accessor in &self.locals {
			if let Some(v) = fields.locals.get(&accessor.name) {
				(accessor.set)(&mut gen, v.clone());
			}
		}
		Box::new(gen)
	}

	fn introspect(&self, gen: &dyn CoroutineGenerator) -> Option<CapturedFields> {
		let gen = gen.as_any().downcast_ref::<G>()?;
		let mut args = FieldMap::new();
		for accessor in &self.args {
			args.insert(accessor.name.clone(), (accessor.get)(gen));
		}
		let mut locals = FieldMap::new();
		for accessor in &self.locals {
			locals.insert(accessor.name.clone(), (accessor.get)(gen));
		}
		Some(CapturedFields {
			state: (self.get_state)(gen),
			current: (self.get_current)(gen),
			receiver: (self.get_receiver)(gen),
			args,
			locals,
		})
	}

	fn known_fields(&self) -> Vec<&str> {
		self.args
			.iter()
			.chain(self.locals.iter())
			.map(|a| a.name.as_str())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::action::StepOutcome;
	use std::any::Any;

	struct Counter {
		id: Identifier,
		state: i32,
		current: Option<Value>,
		start: i64,
	}

	impl CoroutineGenerator for Counter {
		fn method_id(&self) -> &Identifier {
			&self.id
		}

		fn advance(&mut self) -> StepOutcome {
			self.state += 1;
			let v = self.start + self.state as i64;
			self.current = Some(Value::Int(v));
			StepOutcome::Yielded(CoroutineAction::Result(Value::Int(v)))
		}

		fn as_any(&self) -> &dyn Any {
			self
		}

		fn as_any_mut(&mut self) -> &mut dyn Any {
			self
		}
	}

	use crate::action::CoroutineAction;

	fn descriptor() -> GeneratorDescriptor<Counter> {
		let id = Identifier::new("Counter");
		GeneratorDescriptor::builder(
			id.clone(),
			move |state| Counter {
				id: id.clone(),
				state,
				current: None,
				start: 0,
			},
			|g| g.state,
			|g, s| g.state = s,
		)
		.current(|g| g.current.clone(), |g, v| g.current = v)
		.arg("start", |g| Value::Int(g.start), |g, v| g.start = v.as_int().unwrap_or(0))
		.build()
	}

	#[test]
	fn introspect_of_instantiate_round_trips() {
		let d = descriptor();
		let fields = CapturedFields {
			state: 3,
			current: Some(Value::Int(7)),
			receiver: None,
			args: FieldMap::from_iter([("start".to_string(), Value::Int(10))]),
			locals: FieldMap::new(),
		};
		let gen = d.instantiate(&fields);
		let round_tripped = d.introspect(gen.as_ref()).unwrap();
		assert_eq!(round_tripped.state, fields.state);
		assert_eq!(round_tripped.current, fields.current);
		assert_eq!(round_tripped.args.get("start"), fields.args.get("start"));
	}

	#[test]
	fn unknown_keys_are_dropped_on_instantiate() {
		let d = descriptor();
		let fields = CapturedFields {
			state: 0,
			current: None,
			receiver: None,
			args: FieldMap::from_iter([
				("start".to_string(), Value::Int(1)),
				("bogus".to_string(), Value::Bool(true)),
			]),
			locals: FieldMap::new(),
		};
		// Must not panic despite the unrecognized "bogus" key.
		let gen = d.instantiate(&fields);
		let back = d.introspect(gen.as_ref()).unwrap();
		assert!(!back.args.contains_key("bogus"));
	}
}
