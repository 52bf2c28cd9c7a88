//! Ambient "current thread" / "current executor" context.
//!
//! A generator body has no reference to the executor driving it or the
//! thread that owns its frame — it only implements
//! [`advance`](crate::action::CoroutineGenerator::advance). But a handful of
//! things legitimately need that context mid-step: `Delay` needs to read
//! `executor.time()`, `Parallel` needs to spawn children "on the current
//! executor", and any frame wants to read the transient result its popped
//! child frame just left behind.
//!
//! This follows the common `thread_local!`-stack-of-raw-pointers idiom for
//! ambient scheduler context: push on entry to a drive step, pop on exit —
//! including the unwind path, via an RAII guard, so a panicking generator
//! body can never leave stale context behind for the next tick.

use std::cell::RefCell;

use crate::executor::CoroutineExecutor;
use crate::thread::CoroutineThread;

thread_local! {
	static EXECUTOR_STACK: RefCell<Vec<*const CoroutineExecutor>> = const { RefCell::new(Vec::new()) };
	static THREAD_STACK: RefCell<Vec<*const CoroutineThread>> = const { RefCell::new(Vec::new()) };
}

/// Pops its stack's top entry when dropped, regardless of unwind state.
pub(crate) struct ExecutorGuard;

impl Drop for ExecutorGuard {
	fn drop(&mut self) {
		EXECUTOR_STACK.with(|stack| {
			stack.borrow_mut().pop();
		});
	}
}

pub(crate) struct ThreadGuard;

impl Drop for ThreadGuard {
	fn drop(&mut self) {
		THREAD_STACK.with(|stack| {
			stack.borrow_mut().pop();
		});
	}
}

/// Pushes `executor` as the innermost ambient executor for the lifetime of
/// the returned guard.
///
/// # Safety
/// `executor` must remain valid (not moved, not dropped) for as long as the
/// returned guard is alive. Callers satisfy this by holding `&mut self` (or
/// an `Rc`) across the scope in which the guard lives.
pub(crate) unsafe fn enter_executor(executor: *const CoroutineExecutor) -> ExecutorGuard {
	EXECUTOR_STACK.with(|stack| stack.borrow_mut().push(executor));
	ExecutorGuard
}

/// Pushes `thread` as the innermost ambient thread for the lifetime of the
/// returned guard. Same validity contract as [`enter_executor`].
pub(crate) unsafe fn enter_thread(thread: *const CoroutineThread) -> ThreadGuard {
	THREAD_STACK.with(|stack| stack.borrow_mut().push(thread));
	ThreadGuard
}

/// The executor currently driving a tick, if any generator body on the call
/// stack cares to ask.
pub fn current_executor() -> Option<&'static CoroutineExecutor> {
	EXECUTOR_STACK.with(|stack| stack.borrow().last().copied()).map(|ptr| unsafe { &*ptr })
}

/// The thread currently being driven, if any.
pub fn current_thread() -> Option<&'static CoroutineThread> {
	THREAD_STACK.with(|stack| stack.borrow().last().copied()).map(|ptr| unsafe { &*ptr })
}
