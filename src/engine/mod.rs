//! Mutation engine
//!
//! Control flow per run:
//!
//! ```text
//! QueryPager ─page─▶ run_bounded ─doc─▶ Transform ─▶ ConditionalWriter
//!                                            │                │
//!                                            └──── ErrorSink ◀┘
//!                                                     │
//!                                            ProgressTracker
//! ```
//!
//! Pages are strictly sequential. Documents within a page are unordered.

mod errors;
mod outcome;
mod pager;
mod pool;
mod progress;
mod runner;
mod sink;
mod writer;

pub use errors::{DocumentError, EngineError, EngineResult};
pub use outcome::OperationOutcome;
pub use pager::QueryPager;
pub use pool::run_bounded;
pub use progress::{BatchSummary, ProgressSnapshot, ProgressTracker, StrandedDocument};
pub use runner::{CancellationFlag, MutationEngine, OperationMode, RunOptions};
pub use sink::ErrorSink;
pub use writer::{ConditionalWriter, Relocation, RelocationPhase, WritePath};
