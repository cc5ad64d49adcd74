//! streampool: spreads realtime stream sessions across a fixed pool of
//! worker threads.
//!
//! ```text
//!   callers ──ControlRequest──► PoolCoordinator ──WorkerCommand──► worker 0..N
//!      ▲                          │  (registries)                    │
//!      └──── SessionEvent ◄── EventBus ◄──────── WorkerReport ───────┘
//! ```
//!
//! - [`PoolCoordinator`] places each new session on the least-loaded worker
//!   (lowest index on ties), tracks it in that worker's [`SessionRegistry`],
//!   and relays worker reports as [`SessionEvent`]s.
//! - [`WorkerUnit`]s are dedicated threads running an opaque
//!   [`StreamWorkload`].
//! - [`StreamPool`] wires it together and hands out [`PoolHandle`]s.
//!
//! [`SessionEvent`]: poolproto::SessionEvent

pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod pool;
pub mod registry;
pub mod sizing;
pub mod synthetic;
pub mod telemetry;
pub mod worker;

pub use coordinator::{
    Placement, PoolCoordinator, PoolSnapshot, SessionSummary, StopOutcome, WorkerSnapshot,
};
pub use error::PoolError;
pub use events::EventBus;
pub use pool::{PoolHandle, StreamPool};
pub use registry::{SessionRecord, SessionRegistry};
pub use sizing::{detected_parallelism, pool_size};
pub use synthetic::SyntheticWorkload;
pub use worker::{SessionReporter, StreamWorkload, WorkerUnit};
