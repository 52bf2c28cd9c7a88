use std::time::Duration;

use crate::descriptor::CapturedFields;
use crate::error::CoroutineError;
use crate::executor::CoroutineExecutor;
use crate::ident::Identifier;
use crate::registry::GeneratorRegistry;
use crate::thread::{CoroutineThread, ThreadStatus};
use crate::value::FieldMap;

/// A neutral, serializable record of one suspended generator frame.
///
/// This is the wire-shape counterpart of [`CapturedFields`]: the same data,
/// plus the `method_id` needed to look up which descriptor can turn it back
/// into a live generator. Enable the `serde` feature to derive
/// `Serialize`/`Deserialize` directly on this type.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameSnapshot {
	pub method_id: Identifier,
	pub state: i32,
	pub current: Option<crate::value::Value>,
	pub receiver: Option<crate::value::Value>,
	pub args: FieldMap,
	pub locals: FieldMap,
}

/// A snapshot of one [`CoroutineThread`]'s full frame stack, bottom (root)
/// frame first — the same order `CoroutineThread::stack` stores frames in.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadSnapshot {
	pub frames: Vec<FrameSnapshot>,
	pub elapsed_secs: f64,
	pub tag: Option<crate::value::Value>,
}

/// A snapshot of an entire [`CoroutineExecutor`]: its time accumulator plus
/// every currently-alive thread's frame stack. Finished/faulted threads are
/// not captured — there is nothing left to rehydrate.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutorSnapshot {
	pub time_secs: f64,
	pub threads: Vec<ThreadSnapshot>,
}

/// Whether [`SnapshotEngine::rehydrate`] tolerates argument/local keys a
/// descriptor doesn't recognize (dropping them) or rejects them outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RehydrateMode {
	Tolerant,
	Strict,
}

/// Bridges [`GeneratorRegistry`] descriptors to the neutral snapshot types,
/// capturing live frames/threads/executors into plain data and rebuilding
/// live generators back out of them.
pub struct SnapshotEngine<'a> {
	registry: &'a GeneratorRegistry,
}

impl<'a> SnapshotEngine<'a> {
	pub fn new(registry: &'a GeneratorRegistry) -> Self {
		Self { registry }
	}

	/// Captures a single live frame. Fails `UnknownGenerator` if the frame's
	/// `method_id` was never registered, and `ProtocolError` if the
	/// descriptor's concrete type doesn't match the frame's (a registry
	/// usage bug, not something a well-formed host can trigger).
	pub fn capture_frame(&self, frame: &dyn crate::action::CoroutineGenerator) -> Result<FrameSnapshot, CoroutineError> {
		let id = frame.method_id().clone();
		let descriptor = self.registry.lookup(&id)?;
		let fields = descriptor.introspect(frame).ok_or(CoroutineError::ProtocolError)?;
		Ok(FrameSnapshot {
			method_id: id,
			state: fields.state,
			current: fields.current,
			receiver: fields.receiver,
			args: fields.args,
			locals: fields.locals,
		})
	}

	/// Rebuilds a live frame from a snapshot. In [`RehydrateMode::Strict`],
	/// fails `SchemaMismatch` if `snapshot.args`/`snapshot.locals` contain a
	/// key the descriptor does not declare; in [`RehydrateMode::Tolerant`],
	/// such keys are silently dropped.
	pub fn rehydrate_frame(
		&self,
		snapshot: &FrameSnapshot,
		mode: RehydrateMode,
	) -> Result<Box<dyn crate::action::CoroutineGenerator>, CoroutineError> {
		let descriptor = self.registry.lookup(&snapshot.method_id)?;
		if mode == RehydrateMode::Strict {
			let known: std::collections::HashSet<&str> = descriptor.known_fields().into_iter().collect();
			for key in snapshot.args.keys().chain(snapshot.locals.keys()) {
				if !known.contains(key.as_str()) {
					return Err(CoroutineError::SchemaMismatch {
						method: snapshot.method_id.clone(),
						field: key.clone(),
					});
				}
			}
		}
		let fields = CapturedFields {
			state: snapshot.state,
			current: snapshot.current.clone(),
			receiver: snapshot.receiver.clone(),
			args: snapshot.args.clone(),
			locals: snapshot.locals.clone(),
		};
		Ok(descriptor.instantiate(&fields))
	}

	/// Captures every frame on `thread`'s stack, root first.
	pub fn capture_thread(&self, thread: &CoroutineThread) -> Result<ThreadSnapshot, CoroutineError> {
		let stack = thread.stack.borrow();
		let frames = stack
			.iter()
			.map(|frame| self.capture_frame(frame.as_ref()))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(ThreadSnapshot {
			frames,
			elapsed_secs: thread.elapsed().as_secs_f64(),
			tag: thread.tag(),
		})
	}

	/// Rebuilds a [`CoroutineThread`] from a snapshot. Fails `InvalidState`
	/// if `snapshot.frames` is empty — a thread always has at least a root
	/// frame.
	pub fn rehydrate_thread(&self, snapshot: &ThreadSnapshot, mode: RehydrateMode) -> Result<CoroutineThread, CoroutineError> {
		let mut frames = snapshot
			.frames
			.iter()
			.map(|f| self.rehydrate_frame(f, mode))
			.collect::<Result<Vec<_>, _>>()?;
		if frames.is_empty() {
			return Err(CoroutineError::InvalidState("cannot rehydrate a thread with no frames".into()));
		}
		let root = frames.remove(0);
		let thread = CoroutineThread::new(root);
		for frame in frames {
			thread.stack.borrow_mut().push(frame);
		}
		thread.set_tag(snapshot.tag.clone());
		thread.add_elapsed(Duration::from_secs_f64(snapshot.elapsed_secs));
		Ok(thread)
	}

	/// Captures every alive thread on `executor`. Fails `InvalidState` if
	/// called while the executor is mid-`Tick` — a frame's `advance()` may
	/// be holding a mutable borrow of its own stack at that moment.
	pub fn capture_executor(&self, executor: &CoroutineExecutor) -> Result<ExecutorSnapshot, CoroutineError> {
		if executor.is_executing() {
			return Err(CoroutineError::InvalidState("cannot capture an executor mid-tick".into()));
		}
		let threads = executor
			.threads()
			.into_iter()
			.filter(|t| t.status() != ThreadStatus::Finished && t.status() != ThreadStatus::Faulted)
			.map(|t| self.capture_thread(&t))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(ExecutorSnapshot {
			time_secs: executor.time().as_secs_f64(),
			threads,
		})
	}

	/// Rebuilds a fresh [`CoroutineExecutor`] from a snapshot, restoring its
	/// time accumulator and every captured thread.
	pub fn rehydrate_executor(&self, snapshot: &ExecutorSnapshot, mode: RehydrateMode) -> Result<CoroutineExecutor, CoroutineError> {
		let executor = CoroutineExecutor::new();
		for thread_snapshot in &snapshot.threads {
			let thread = self.rehydrate_thread(thread_snapshot, mode)?;
			executor.adopt(thread);
		}
		executor.set_time(Duration::from_secs_f64(snapshot.time_secs));
		Ok(executor)
	}
}
