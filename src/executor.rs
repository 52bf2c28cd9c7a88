use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::action::{CoroutineAction, CoroutineGenerator, StepOutcome};
use crate::context;
use crate::descriptor::GeneratorDescriptor;
use crate::error::CoroutineError;
use crate::ident::Identifier;
use crate::registry::GeneratorRegistry;
use crate::thread::{CoroutineThread, ThreadStatus};
use crate::value::Value;

/// Owner of threads, wall-clock accumulator, per-tick driver, parallel
/// composer, and delay builder.
///
/// Not `Send`/`Sync`: every mutable field is a `Cell`/`RefCell` so that a
/// shared `&CoroutineExecutor` (reachable through ambient
/// [`context::current_executor`]) suffices for generator bodies to read
/// `time()` or spawn a new top-level thread mid-tick.
pub struct CoroutineExecutor {
	threads: std::cell::RefCell<Vec<Rc<CoroutineThread>>>,
	time: Cell<Duration>,
	executing: Cell<bool>,
}

impl Default for CoroutineExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl CoroutineExecutor {
	pub fn new() -> Self {
		Self {
			threads: std::cell::RefCell::new(Vec::new()),
			time: Cell::new(Duration::ZERO),
			executing: Cell::new(false),
		}
	}

	pub fn time(&self) -> Duration {
		self.time.get()
	}

	pub fn thread_count(&self) -> usize {
		self.threads.borrow().len()
	}

	pub fn threads(&self) -> Vec<Rc<CoroutineThread>> {
		self.threads.borrow().clone()
	}

	/// Appends an already-constructed thread (used by
	/// [`crate::snapshot::SnapshotEngine::rehydrate_executor`] to reinstate
	/// threads rebuilt from a snapshot) and returns a shared handle to it.
	pub(crate) fn adopt(&self, thread: CoroutineThread) -> Rc<CoroutineThread> {
		let thread = Rc::new(thread);
		self.threads.borrow_mut().push(thread.clone());
		thread
	}

	/// Overwrites the time accumulator, used only when rehydrating from an
	/// [`crate::snapshot::ExecutorSnapshot`].
	pub(crate) fn set_time(&self, time: Duration) {
		self.time.set(time);
	}

	/// Creates and appends a thread running `gen`.
	///
	/// # Errors
	/// Always `Ok` in practice: a non-nullable `Box` rules the classic
	/// null-generator failure mode out statically. The `Result` signature is
	/// kept anyway so callers have one stable error-handling shape across
	/// every fallible operation on the executor.
	pub fn start(&mut self, gen: Box<dyn CoroutineGenerator>) -> Result<Rc<CoroutineThread>, CoroutineError> {
		Ok(self.start_raw(gen))
	}

	/// Same as [`start`](Self::start) but callable through a shared
	/// reference — this is what ambient context exposes to a generator body
	/// that wants to spawn a sibling thread mid-step (e.g. `Parallel`).
	pub(crate) fn start_raw(&self, gen: Box<dyn CoroutineGenerator>) -> Rc<CoroutineThread> {
		let thread = Rc::new(CoroutineThread::new(gen));
		self.threads.borrow_mut().push(thread.clone());
		thread
	}

	/// Returns a generator that yields `NullYield` while `time() < start +
	/// duration`, where `start` is captured the first time the generator is
	/// advanced (not when this function is called).
	pub fn delay(&self, duration: Duration) -> Box<dyn CoroutineGenerator> {
		Box::new(DelayGenerator::new(duration))
	}

	/// Returns a generator that starts each of `gens` as a new top-level
	/// thread and yields `NullYield` until all finish or one faults.
	pub fn parallel(&self, gens: Vec<Box<dyn CoroutineGenerator>>) -> Box<dyn CoroutineGenerator> {
		Box::new(ParallelGenerator::new(gens))
	}

	/// Rejects a negative `dt` or a reentrant call. Advances `time`, then
	/// drives every thread that was alive at loop-entry time, in insertion
	/// order. Threads appended mid-tick (via `Parallel` or a generator body
	/// calling the ambient `start_raw`) are included in this same tick —
	/// see DESIGN.md for the reasoning behind that choice.
	pub fn tick(&mut self, dt: Duration) -> Result<usize, CoroutineError> {
		if self.executing.get() {
			return Err(CoroutineError::InvalidState("reentrant Tick call".into()));
		}
		self.executing.set(true);
		// Clears the reentrancy flag on every exit path, including an unwind
		// triggered by a faulting generator body, so a caught panic doesn't
		// leave the executor permanently refusing further ticks.
		let _executing_guard = ExecutingGuard { flag: &self.executing };
		self.time.set(self.time.get() + dt);
		log::debug!("tick start: time={:?} dt={:?}", self.time.get(), dt);

		// SAFETY: `self` outlives `_guard` — the guard is dropped at the end
		// of this function body, before `self` could be moved or dropped.
		let _guard = unsafe { context::enter_executor(self as *const CoroutineExecutor) };

		let mut alive = 0usize;
		let mut i = 0usize;
		loop {
			let thread = {
				let threads = self.threads.borrow();
				if i >= threads.len() {
					break;
				}
				threads[i].clone()
			};
			i += 1;
			if !thread.is_alive() {
				continue;
			}
			self.drive_thread(&thread, dt)?;
			if thread.is_alive() {
				alive += 1;
			}
		}

		log::debug!("tick end: time={:?} alive={alive}", self.time.get());
		Ok(alive)
	}

	fn drive_thread(&self, thread: &Rc<CoroutineThread>, dt: Duration) -> Result<(), CoroutineError> {
		// SAFETY: `thread` is kept alive by the `Rc` held in `self.threads`
		// for at least as long as this function runs.
		let _guard = unsafe { context::enter_thread(Rc::as_ptr(thread)) };
		thread.add_elapsed(dt);

		// `clear_result` runs immediately after the frame that is entitled to
		// observe the previous step's result has been driven — never before.
		// That is what makes the result slot a one-shot signal visible to
		// exactly the next-top frame's next step.
		loop {
			thread.set_status(ThreadStatus::Executing);

			let step = {
				let mut stack = thread.stack.borrow_mut();
				let top = stack.last_mut().expect("stack non-empty while status < Finished");
				let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| top.advance()));
				match result {
					Ok(outcome) => outcome,
					Err(payload) => {
						drop(stack);
						let exception = extract_exception(&payload);
						thread.dispose(Some(exception));
						thread.set_status(ThreadStatus::Faulted);
						thread.clear_result();
						std::panic::resume_unwind(payload);
					}
				}
			};
			thread.clear_result();
			thread.set_status(ThreadStatus::Yielded);
			log::trace!(
				"drive step: frames={} status={:?}",
				thread.frame_count(),
				thread.status()
			);

			match step {
				StepOutcome::Completed => {
					let mut frame = thread.stack.borrow_mut().pop().expect("top frame exists");
					frame.close();
					if thread.stack.borrow().is_empty() {
						thread.dispose(None);
						break;
					}
				}
				StepOutcome::Yielded(action) => match action {
					CoroutineAction::NullYield => break,
					CoroutineAction::Nested(gen) => {
						thread.stack.borrow_mut().push(gen);
					}
					CoroutineAction::Delay(duration) => {
						thread.stack.borrow_mut().push(self.delay(duration));
					}
					CoroutineAction::Parallel(gens) => {
						thread.stack.borrow_mut().push(self.parallel(gens));
					}
					CoroutineAction::Result(value) => {
						let mut frame = thread.stack.borrow_mut().pop().expect("top frame exists");
						frame.close();
						thread.set_result(value);
						if thread.stack.borrow().is_empty() {
							thread.dispose(None);
							break;
						}
					}
				},
			}
		}

		Ok(())
	}

	/// Drives ticks using a wall-clock source scaled by `factor` until a
	/// tick reports zero living threads.
	pub fn finish(&mut self, factor: f64) -> Result<(), CoroutineError> {
		if factor <= 0.0 {
			return Err(CoroutineError::InvalidArgument("factor must be positive".into()));
		}
		let mut last = std::time::Instant::now();
		loop {
			let now = std::time::Instant::now();
			let real_dt = now.duration_since(last);
			last = now;
			let scaled = Duration::from_secs_f64(real_dt.as_secs_f64() * factor);
			if self.tick(scaled)? == 0 {
				return Ok(());
			}
		}
	}

	/// Disposes remaining threads in reverse insertion order.
	pub fn dispose(&mut self) {
		let threads = self.threads.borrow().clone();
		for thread in threads.iter().rev() {
			thread.dispose(None);
		}
	}

	pub(crate) fn is_executing(&self) -> bool {
		self.executing.get()
	}
}

impl Drop for CoroutineExecutor {
	fn drop(&mut self) {
		self.dispose();
	}
}

struct ExecutingGuard<'a> {
	flag: &'a Cell<bool>,
}

impl Drop for ExecutingGuard<'_> {
	fn drop(&mut self) {
		self.flag.set(false);
	}
}

/// Recovers the owning thread's fault from a caught panic payload. A
/// composing frame that wants to surface a child's fault as its own panics
/// with the child's `CoroutineError` directly (see `ParallelGenerator`), so
/// that case is checked before falling back to stringifying an ordinary
/// `&str`/`String` panic payload.
fn extract_exception(payload: &(dyn Any + Send)) -> CoroutineError {
	if let Some(err) = payload.downcast_ref::<CoroutineError>() {
		err.clone()
	} else if let Some(s) = payload.downcast_ref::<&str>() {
		CoroutineError::UserError((*s).to_string())
	} else if let Some(s) = payload.downcast_ref::<String>() {
		CoroutineError::UserError(s.clone())
	} else {
		CoroutineError::UserError("generator panicked with a non-string payload".to_string())
	}
}

fn builtin_id(method: &str) -> Identifier {
	Identifier::namespaced("snapcoro::executor", method)
}

/// Built-in generator backing [`CoroutineExecutor::delay`] and the `Delay`
/// action. Registered separately via [`register_builtins`] for hosts that
/// want `Delay`/`Parallel` frames to be snapshot-capturable.
struct DelayGenerator {
	id: Identifier,
	state: i32,
	start: Option<Duration>,
	duration: Duration,
}

impl DelayGenerator {
	fn new(duration: Duration) -> Self {
		Self {
			id: builtin_id("Delay"),
			state: 0,
			start: None,
			duration,
		}
	}
}

impl CoroutineGenerator for DelayGenerator {
	fn method_id(&self) -> &Identifier {
		&self.id
	}

	fn advance(&mut self) -> StepOutcome {
		let now = context::current_executor()
			.map(|e| e.time())
			.unwrap_or_default();
		if self.state == 0 {
			self.start = Some(now);
			self.state = 1;
		}
		let start = self.start.expect("start captured on first advance");
		if now < start + self.duration {
			StepOutcome::Yielded(CoroutineAction::NullYield)
		} else {
			StepOutcome::Completed
		}
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

/// Built-in generator backing [`CoroutineExecutor::parallel`] and the
/// `Parallel` action. A join point, not an owning scope: if a child faults,
/// this frame surfaces that fault and completes without disposing its
/// siblings.
struct ParallelGenerator {
	id: Identifier,
	state: i32,
	pending: Vec<Box<dyn CoroutineGenerator>>,
	children: Vec<Rc<CoroutineThread>>,
}

impl ParallelGenerator {
	fn new(gens: Vec<Box<dyn CoroutineGenerator>>) -> Self {
		Self {
			id: builtin_id("Parallel"),
			state: 0,
			pending: gens,
			children: Vec::new(),
		}
	}
}

impl CoroutineGenerator for ParallelGenerator {
	fn method_id(&self) -> &Identifier {
		&self.id
	}

	/// Yielding `Result` always pops this frame (see the executor's drive
	/// loop), so the fault/join branches below each run at most once per
	/// instance — there is no repeated-yield case to guard against.
	fn advance(&mut self) -> StepOutcome {
		if self.state == 0 {
			let executor = context::current_executor().expect("Parallel driven outside an executor");
			for gen in self.pending.drain(..) {
				self.children.push(executor.start_raw(gen));
			}
			self.state = 1;
			return StepOutcome::Yielded(CoroutineAction::NullYield);
		}

		if let Some(faulted) = self.children.iter().find(|c| c.status() == ThreadStatus::Faulted) {
			let exception = faulted.exception().unwrap_or(CoroutineError::ProtocolError);
			log::warn!("Parallel composing frame observed a faulted child: {exception}");
			std::panic::panic_any(exception);
		}

		if self.children.iter().all(|c| c.status() == ThreadStatus::Finished) {
			return StepOutcome::Yielded(CoroutineAction::Result(Value::Null));
		}

		StepOutcome::Yielded(CoroutineAction::NullYield)
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

/// Registers descriptors for the executor's own built-in generators
/// (`Delay`, `Parallel`) so a host that wants whole-executor snapshots can
/// capture frames the executor itself pushed, not just user-authored ones.
pub fn register_builtins(registry: &mut GeneratorRegistry) -> Result<(), CoroutineError> {
	registry.register(Box::new(
		GeneratorDescriptor::builder(
			builtin_id("Delay"),
			|state| DelayGenerator {
				id: builtin_id("Delay"),
				state,
				start: None,
				duration: Duration::ZERO,
			},
			|g| g.state,
			|g, s| g.state = s,
		)
		.arg(
			"duration_secs",
			|g| Value::Float(g.duration.as_secs_f64()),
			|g, v| g.duration = Duration::from_secs_f64(v.as_float().unwrap_or(0.0)),
		)
		.local(
			"start_secs",
			|g| match g.start {
				Some(d) => Value::Float(d.as_secs_f64()),
				None => Value::Null,
			},
			|g, v| g.start = v.as_float().map(Duration::from_secs_f64),
		)
		.build(),
	))?;

	// `pending`/`children` hold live generator and thread handles that a
	// neutral `Value` cannot carry, so only `state` round-trips here; a
	// rehydrated Parallel frame always comes back with no children and
	// re-spawns its (now-empty) pending list as a no-op join. Capturing a
	// whole executor (every thread, including ones `Parallel` spawned) is
	// what actually preserves an in-flight join across a snapshot.
	registry.register(Box::new(
		GeneratorDescriptor::builder(
			builtin_id("Parallel"),
			|state| ParallelGenerator {
				id: builtin_id("Parallel"),
				state,
				pending: Vec::new(),
				children: Vec::new(),
			},
			|g| g.state,
			|g, s| g.state = s,
		)
		.build(),
	))
}
