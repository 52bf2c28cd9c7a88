//! A single-threaded cooperative coroutine runtime.
//!
//! A generator body is any [`action::CoroutineGenerator`] — something that
//! can be driven one step at a time and that yields an
//! [`action::CoroutineAction`] describing what the driver should do next:
//! suspend, nest another generator, delay, run a set of generators in
//! parallel, or hand back a result. A [`thread::CoroutineThread`] is a LIFO
//! stack of such frames; a [`executor::CoroutineExecutor`] owns a flat list
//! of threads and advances all of them by one logical tick at a time.
//!
//! Orthogonal to driving is snapshotting: a [`registry::GeneratorRegistry`]
//! holds one [`descriptor::GeneratorDescriptor`] per generator type, each
//! describing how to read (`introspect`) or rebuild (`instantiate`) that
//! type's state, current/receiver values, arguments, and hoisted locals as
//! plain [`value::Value`]s. [`snapshot::SnapshotEngine`] uses the registry to
//! turn a live thread or whole executor into a [`snapshot::FrameSnapshot`]
//! tree and back, so a suspended run can be serialized, stored, and resumed
//! later — potentially in a different process.
//!
//! # Non-goals
//! This crate does not capture a native call stack (no fiber/ucontext-style
//! stackful coroutines) and does not schedule across OS threads — every
//! [`executor::CoroutineExecutor`] is driven synchronously, one tick at a
//! time, by whoever calls [`executor::CoroutineExecutor::tick`].

pub mod action;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod ident;
pub mod registry;
pub mod snapshot;
pub mod thread;
pub mod value;

pub use action::{CoroutineAction, CoroutineGenerator, StepOutcome};
pub use descriptor::{CapturedFields, ErasedDescriptor, GeneratorDescriptor, GeneratorDescriptorBuilder};
pub use error::CoroutineError;
pub use executor::CoroutineExecutor;
pub use ident::{derive_identifier, Identifier};
pub use registry::GeneratorRegistry;
pub use snapshot::{ExecutorSnapshot, FrameSnapshot, RehydrateMode, SnapshotEngine, ThreadSnapshot};
pub use thread::{CoroutineThread, ThreadStatus};
pub use value::{FieldMap, Value};
