//! poolproto - message types for the streampool control plane
//!
//! Three conversations share these types:
//!
//! - **Control** (`ControlRequest`): callers asking the pool to start or stop
//!   a session, or to describe itself.
//! - **Worker** (`WorkerCommand` / `WorkerReport`): the coordinator's
//!   point-to-point link with each worker unit.
//! - **Events** (`SessionEvent`): status transitions published to listeners,
//!   keyed by session.
//!
//! Everything serializes as JSON with snake_case tags, so the same types are
//! used on the stdin/stdout bridge and in-process.

pub mod domain;
pub mod messages;

pub use domain::{ActivationId, ParseStateError, SessionKey, SessionState, StreamPayload};
pub use messages::{ControlRequest, SessionEvent, WorkerCommand, WorkerReport};
