use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use snapcoro::{
	CoroutineAction, CoroutineError, CoroutineExecutor, CoroutineGenerator, GeneratorDescriptor, GeneratorRegistry,
	Identifier, RehydrateMode, SnapshotEngine, StepOutcome, ThreadStatus, Value,
};

/// S1: yields 1, then 2, then completes.
struct YieldOnly {
	id: Identifier,
	state: i32,
	current: Option<Value>,
}

impl CoroutineGenerator for YieldOnly {
	fn method_id(&self) -> &Identifier {
		&self.id
	}
	fn advance(&mut self) -> StepOutcome {
		self.state += 1;
		match self.state {
			1 => {
				self.current = Some(Value::Int(1));
				StepOutcome::Yielded(CoroutineAction::NullYield)
			}
			2 => {
				self.current = Some(Value::Int(2));
				StepOutcome::Yielded(CoroutineAction::NullYield)
			}
			_ => StepOutcome::Completed,
		}
	}
	fn as_any(&self) -> &dyn Any {
		self
	}
	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

fn yield_only_descriptor() -> GeneratorDescriptor<YieldOnly> {
	let id = Identifier::new("YieldOnly");
	let id2 = id.clone();
	GeneratorDescriptor::builder(
		id,
		move |state| YieldOnly {
			id: id2.clone(),
			state,
			current: None,
		},
		|g| g.state,
		|g, s| g.state = s,
	)
	.current(|g| g.current.clone(), |g, v| g.current = v)
	.build()
}

/// S2: `r := 1; yield r; r *= 3; yield r; r *= 4; yield r`.
struct YieldWithVar {
	id: Identifier,
	state: i32,
	current: Option<Value>,
	r: i64,
}

impl CoroutineGenerator for YieldWithVar {
	fn method_id(&self) -> &Identifier {
		&self.id
	}
	fn advance(&mut self) -> StepOutcome {
		self.state += 1;
		match self.state {
			1 => self.r = 1,
			2 => self.r *= 3,
			3 => self.r *= 4,
			_ => return StepOutcome::Completed,
		}
		self.current = Some(Value::Int(self.r));
		StepOutcome::Yielded(CoroutineAction::NullYield)
	}
	fn as_any(&self) -> &dyn Any {
		self
	}
	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

fn yield_with_var_descriptor() -> GeneratorDescriptor<YieldWithVar> {
	let id = Identifier::new("YieldWithVar");
	let id2 = id.clone();
	GeneratorDescriptor::builder(
		id,
		move |state| YieldWithVar {
			id: id2.clone(),
			state,
			current: None,
			r: 0,
		},
		|g| g.state,
		|g, s| g.state = s,
	)
	.current(|g| g.current.clone(), |g, v| g.current = v)
	.local("r", |g| Value::Int(g.r), |g, v| g.r = v.as_int().unwrap_or(0))
	.build()
}

/// S3: same body as S2, seeded from an argument instead of a literal.
struct YieldWithVarAndArg {
	id: Identifier,
	state: i32,
	current: Option<Value>,
	r: i64,
	start: i64,
}

impl CoroutineGenerator for YieldWithVarAndArg {
	fn method_id(&self) -> &Identifier {
		&self.id
	}
	fn advance(&mut self) -> StepOutcome {
		self.state += 1;
		match self.state {
			1 => self.r = self.start,
			2 => self.r *= 3,
			3 => self.r *= 4,
			_ => return StepOutcome::Completed,
		}
		self.current = Some(Value::Int(self.r));
		StepOutcome::Yielded(CoroutineAction::NullYield)
	}
	fn as_any(&self) -> &dyn Any {
		self
	}
	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

fn yield_with_var_and_arg_descriptor() -> GeneratorDescriptor<YieldWithVarAndArg> {
	let id = Identifier::new("YieldWithVarAndArg");
	let id2 = id.clone();
	GeneratorDescriptor::builder(
		id,
		move |state| YieldWithVarAndArg {
			id: id2.clone(),
			state,
			current: None,
			r: 0,
			start: 0,
		},
		|g| g.state,
		|g, s| g.state = s,
	)
	.current(|g| g.current.clone(), |g, v| g.current = v)
	.arg("start", |g| Value::Int(g.start), |g, v| g.start = v.as_int().unwrap_or(0))
	.local("r", |g| Value::Int(g.r), |g, v| g.r = v.as_int().unwrap_or(0))
	.build()
}

#[test]
fn s1_yield_only_round_trip() -> Result<(), CoroutineError> {
	let mut registry = GeneratorRegistry::new();
	registry.register(Box::new(yield_only_descriptor()))?;
	let engine = SnapshotEngine::new(&registry);

	let mut gen = YieldOnly {
		id: Identifier::new("YieldOnly"),
		state: 0,
		current: None,
	};
	assert!(matches!(gen.advance(), StepOutcome::Yielded(_)));
	assert_eq!(gen.current, Some(Value::Int(1)));
	let s1 = engine.capture_frame(&gen)?;
	assert_eq!(s1.state, 1);

	assert!(matches!(gen.advance(), StepOutcome::Yielded(_)));
	assert_eq!(gen.current, Some(Value::Int(2)));
	let s2 = engine.capture_frame(&gen)?;
	assert_eq!(s2.state, 2);
	assert_eq!(s2.current, Some(Value::Int(2)));

	let mut rehydrated = engine.rehydrate_frame(&s2, RehydrateMode::Tolerant)?;
	assert!(matches!(rehydrated.advance(), StepOutcome::Completed));
	Ok(())
}

#[test]
fn s2_local_var_round_trip() -> Result<(), CoroutineError> {
	let mut registry = GeneratorRegistry::new();
	registry.register(Box::new(yield_with_var_descriptor()))?;
	let engine = SnapshotEngine::new(&registry);

	let mut gen = YieldWithVar {
		id: Identifier::new("YieldWithVar"),
		state: 0,
		current: None,
		r: 0,
	};
	gen.advance();
	assert_eq!(gen.current, Some(Value::Int(1)));
	gen.advance();
	assert_eq!(gen.current, Some(Value::Int(3)));

	let snap = engine.capture_frame(&gen)?;
	let mut rehydrated = engine.rehydrate_frame(&snap, RehydrateMode::Tolerant)?;
	let fields = engine.capture_frame(rehydrated.as_ref())?;
	assert_eq!(fields.current, Some(Value::Int(3)));

	match rehydrated.advance() {
		StepOutcome::Yielded(CoroutineAction::NullYield) => {}
		other => panic!("expected a yield, got {other:?}"),
	}
	let fields = engine.capture_frame(rehydrated.as_ref())?;
	assert_eq!(fields.current, Some(Value::Int(12)));

	assert!(matches!(rehydrated.advance(), StepOutcome::Completed));
	Ok(())
}

#[test]
fn s3_argument_round_trip() -> Result<(), CoroutineError> {
	let mut registry = GeneratorRegistry::new();
	registry.register(Box::new(yield_with_var_and_arg_descriptor()))?;
	let engine = SnapshotEngine::new(&registry);

	let mut gen = YieldWithVarAndArg {
		id: Identifier::new("YieldWithVarAndArg"),
		state: 0,
		current: None,
		r: 0,
		start: 5,
	};
	gen.advance();
	gen.advance();
	assert_eq!(gen.current, Some(Value::Int(15)));

	let snap = engine.capture_frame(&gen)?;
	assert_eq!(snap.args.get("start"), Some(&Value::Int(5)));

	let mut rehydrated = engine.rehydrate_frame(&snap, RehydrateMode::Tolerant)?;
	let fields = engine.capture_frame(rehydrated.as_ref())?;
	assert_eq!(fields.current, Some(Value::Int(15)));

	rehydrated.advance();
	let fields = engine.capture_frame(rehydrated.as_ref())?;
	assert_eq!(fields.current, Some(Value::Int(60)));

	assert!(matches!(rehydrated.advance(), StepOutcome::Completed));
	Ok(())
}

#[test]
fn s4_delay_across_ticks() -> Result<(), CoroutineError> {
	let _ = env_logger::try_init();
	let mut executor = CoroutineExecutor::new();
	let gen = executor.delay(Duration::from_secs_f64(1.0));
	let thread = executor.start(gen)?;
	assert_eq!(thread.status(), ThreadStatus::Yielded);

	executor.tick(Duration::from_millis(550))?;
	assert_eq!(thread.status(), ThreadStatus::Yielded);

	executor.tick(Duration::from_millis(550))?;
	assert_eq!(thread.status(), ThreadStatus::Yielded);

	executor.tick(Duration::from_millis(550))?;
	assert_eq!(thread.status(), ThreadStatus::Finished);
	Ok(())
}

/// Two `Delay(0.5)` children joined by `Parallel`, five ticks of 0.2s each.
///
/// The literal tick count differs from a naive `duration / tick_len`
/// count because a child's `start` is captured on *its own* first
/// `advance()`, one tick after the composing frame spawns it (see
/// DESIGN.md's "mid-tick append" entry) — so each child's deadline is
/// relative to the tick it actually started on, not the tick `Parallel`
/// itself started on.
#[test]
fn s5_parallel_join() -> Result<(), CoroutineError> {
	let mut executor = CoroutineExecutor::new();
	let children: Vec<Box<dyn CoroutineGenerator>> = vec![
		executor.delay(Duration::from_millis(500)),
		executor.delay(Duration::from_millis(500)),
	];
	let gen = executor.parallel(children);
	let root = executor.start(gen)?;

	let tick_len = Duration::from_millis(200);
	let alive_after_each_tick: Vec<usize> = (0..5).map(|_| executor.tick(tick_len).unwrap()).collect();

	assert_eq!(alive_after_each_tick, vec![3, 3, 3, 1, 0]);
	assert_eq!(root.status(), ThreadStatus::Finished);
	Ok(())
}

/// A generator that panics the moment it is driven, standing in for a
/// generator body that raises a user-level fault.
struct FaultingGen {
	id: Identifier,
}

impl CoroutineGenerator for FaultingGen {
	fn method_id(&self) -> &Identifier {
		&self.id
	}
	fn advance(&mut self) -> StepOutcome {
		panic!("child exploded");
	}
	fn as_any(&self) -> &dyn Any {
		self
	}
	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

/// Property 6: a `Parallel` with a faulting child surfaces that child's
/// exception to the composing thread, rather than joining successfully with
/// a stringified error as its result.
#[test]
fn parallel_surfaces_a_faulting_childs_exception_to_the_composing_thread() {
	let mut executor = CoroutineExecutor::new();
	let children: Vec<Box<dyn CoroutineGenerator>> = vec![Box::new(FaultingGen {
		id: Identifier::new("Faulting"),
	})];
	let gen = executor.parallel(children);
	let root = executor.start(gen).unwrap();

	// Tick 1: the composing frame spawns the child; the newly appended child
	// thread is driven within this same tick and panics immediately.
	let first = panic::catch_unwind(AssertUnwindSafe(|| executor.tick(Duration::from_millis(100))));
	assert!(first.is_err(), "the child's panic should propagate out of tick()");

	let child = executor
		.threads()
		.into_iter()
		.find(|t| !Rc::ptr_eq(t, &root))
		.expect("child thread was spawned");
	assert_eq!(child.status(), ThreadStatus::Faulted);
	assert!(child.exception().is_some());

	// Tick 2: the composing frame observes the faulted child and re-panics
	// with its exception, so the executor being reusable after a caught
	// panic is itself part of what this test checks.
	let second = panic::catch_unwind(AssertUnwindSafe(|| executor.tick(Duration::from_millis(100))));
	assert!(second.is_err(), "the composing frame's re-raised fault should propagate out of tick()");

	assert_eq!(root.status(), ThreadStatus::Faulted);
	assert!(root.exception().is_some());
}

#[test]
fn s6_executor_snapshot_mid_flight() -> Result<(), CoroutineError> {
	let mut registry = GeneratorRegistry::new();
	snapcoro::executor::register_builtins(&mut registry)?;
	let engine = SnapshotEngine::new(&registry);

	let mut original = CoroutineExecutor::new();
	let gen = original.delay(Duration::from_secs_f64(1.0));
	let thread = original.start(gen)?;
	original.tick(Duration::from_millis(550))?;
	original.tick(Duration::from_millis(550))?;
	assert_eq!(thread.status(), ThreadStatus::Yielded);

	let snapshot = engine.capture_executor(&original)?;
	assert_eq!(snapshot.threads.len(), 1);

	original.tick(Duration::from_millis(550))?;
	assert_eq!(thread.status(), ThreadStatus::Finished);

	let rehydrated = engine.rehydrate_executor(&snapshot, RehydrateMode::Tolerant)?;
	let rehydrated_threads = rehydrated.threads();
	assert_eq!(rehydrated_threads.len(), 1);

	let mut rehydrated = rehydrated;
	rehydrated.tick(Duration::from_millis(550))?;
	assert_eq!(rehydrated_threads[0].status(), ThreadStatus::Finished);
	Ok(())
}

