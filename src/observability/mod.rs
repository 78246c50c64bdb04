//! Observability for docshift
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle and per-document events
//! - Scope-based begin/complete logging
//!
//! # Usage
//!
//! ```ignore
//! use docshift::observability::{Event, Logger, Severity};
//!
//! let logger = Logger::stdio(Severity::Info);
//! logger.info(Event::PageComplete, &[("documents_seen", "40")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;
