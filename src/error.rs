use crate::ident::Identifier;

/// Errors surfaced across the public API boundary.
///
/// Mirrors the taxonomy a host needs to distinguish programmer mistakes
/// (`InvalidArgument`, `InvalidState`) from data-level mismatches
/// (`UnknownGenerator`, `SchemaMismatch`) from runtime faults raised by a
/// generator body (`UserError`) or by a generator that yields something the
/// driver doesn't understand (`ProtocolError`).
#[derive(Clone, Debug, thiserror::Error)]
pub enum CoroutineError {
	/// A null/out-of-range input was passed at an API boundary.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// The call was made while the executor/thread was in a state that
	/// forbids it (reentrant tick, snapshot-while-executing, reading a
	/// result when none is pending).
	#[error("invalid state: {0}")]
	InvalidState(String),

	/// A `FrameSnapshot` or descriptor lookup referenced a methodId that was
	/// never registered.
	#[error("unknown generator method: {0}")]
	UnknownGenerator(Identifier),

	/// The descriptor does not recognize an argument or local name found
	/// while rehydrating in strict mode.
	#[error("schema mismatch on {method}: unrecognized field {field:?}")]
	SchemaMismatch { method: Identifier, field: String },

	/// A generator yielded a value the driver does not recognize as a
	/// `CoroutineAction`.
	#[error("protocol error: generator yielded an unrecognized action")]
	ProtocolError,

	/// A generator body panicked; the owning thread has been faulted and
	/// drained. The original panic is still propagated to the caller of
	/// `Tick` (this variant is only ever seen via `thread.exception()`).
	#[error("generator body panicked: {0}")]
	UserError(String),
}
