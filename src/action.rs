use std::any::Any;
use std::time::Duration;

use crate::ident::Identifier;
use crate::value::Value;

/// The live, opaque handle a [`CoroutineThread`](crate::thread::CoroutineThread)
/// frame drives one step at a time.
///
/// A generator method is any Rust type implementing this trait. The trait
/// itself has nothing to do with snapshotting — it is the "how do I advance"
/// contract the driver needs. Snapshot capture/rehydrate goes through a
/// separately registered [`GeneratorDescriptor`](crate::descriptor::GeneratorDescriptor)
/// keyed by [`method_id`](CoroutineGenerator::method_id), so a type can be
/// driven without ever being registered (it just won't be capturable).
pub trait CoroutineGenerator: Any {
	/// Identifies which registered descriptor (if any) knows how to
	/// introspect/instantiate this generator's concrete type.
	fn method_id(&self) -> &Identifier;

	/// Advance by one step, running until the next yield point or
	/// completion. May panic; the owning thread catches it and faults.
	fn advance(&mut self) -> StepOutcome;

	/// Runs when this frame is popped off a thread's stack, whether by
	/// completing, by yielding `Result`, or by the owning thread being
	/// disposed. Default no-op; override to release resources.
	fn close(&mut self) {}

	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What a single call to [`CoroutineGenerator::advance`] produced.
#[derive(Debug)]
pub enum StepOutcome {
	/// The generator yielded a directive for the driver to act on.
	Yielded(CoroutineAction),
	/// The generator body ran to completion; no further yields.
	Completed,
}

/// A directive yielded by a generator body, observed and dispatched by the
/// driver. Because this is a closed enum rather than a dynamically-typed
/// yield, a generator cannot produce a malformed action — the type system
/// rules that out at compile time instead of leaving the driver to classify
/// an arbitrary yielded value at runtime.
pub enum CoroutineAction {
	/// Continue next tick; no state changes beyond that.
	NullYield,
	/// Push `gen` onto the stack; the driver continues without yielding to
	/// the next tick.
	Nested(Box<dyn CoroutineGenerator>),
	/// Equivalent to pushing a generator that yields `NullYield` until
	/// `executor.time` reaches `start + duration`.
	Delay(Duration),
	/// Start each generator as a new top-level thread on the current
	/// executor, then yield `NullYield` until all finish or one faults.
	Parallel(Vec<Box<dyn CoroutineGenerator>>),
	/// Set the thread's transient result slot and pop this frame.
	Result(Value),
}

impl CoroutineAction {
	/// Alias for [`CoroutineAction::Nested`], preserved for ergonomics at
	/// call sites that read more naturally as "execute this sub-generator".
	pub fn execute(gen: Box<dyn CoroutineGenerator>) -> Self {
		CoroutineAction::Nested(gen)
	}
}

impl std::fmt::Debug for CoroutineAction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CoroutineAction::NullYield => write!(f, "NullYield"),
			CoroutineAction::Nested(g) => write!(f, "Nested({})", g.method_id()),
			CoroutineAction::Delay(d) => write!(f, "Delay({d:?})"),
			CoroutineAction::Parallel(gens) => write!(f, "Parallel(n={})", gens.len()),
			CoroutineAction::Result(v) => write!(f, "Result({v:?})"),
		}
	}
}
