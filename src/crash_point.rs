//! Crash point injection
//!
//! Crash points are enabled via the `DOCSHIFT_CRASH_POINT` environment
//! variable. When the named point is reached the process terminates via
//! `std::process::abort()` - no cleanup, no unwinding, no catching.
//!
//! They exist to reproduce what a real process death does to multi-step
//! store operations, most notably a relocation that has deleted its source
//! but not yet written its replacement.
//!
//! ```bash
//! DOCSHIFT_CRASH_POINT=relocation_after_delete docshift run --config run.json --execute
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "DOCSHIFT_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `DOCSHIFT_CRASH_POINT` equals the given name
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    /// Relocation: before the conditional delete of the source
    pub const RELOCATION_BEFORE_DELETE: &str = "relocation_before_delete";
    /// Relocation: source deleted, replacement not yet written
    pub const RELOCATION_AFTER_DELETE: &str = "relocation_after_delete";
    /// In-place path: before the conditional replace
    pub const REPLACE_BEFORE_WRITE: &str = "replace_before_write";

    /// Get all crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            RELOCATION_BEFORE_DELETE,
            RELOCATION_AFTER_DELETE,
            REPLACE_BEFORE_WRITE,
        ]
    }
}
