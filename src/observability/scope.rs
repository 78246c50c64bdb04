//! ObservationScope for automatic begin/complete logging
//!
//! - Logs the begin event on creation
//! - Logs the complete event when `complete()` is called
//! - Logs the failed event on `fail()`
//! - Logs `BATCH_INCOMPLETE` on drop if neither was called

use std::cell::Cell;

use super::events::Event;
use super::logger::Logger;

/// A scope that logs the start and end of a unit of work
///
/// # Usage
///
/// ```ignore
/// let scope = ObservationScope::new(&logger, Event::BatchBegin, &[("mode", "edit")]);
/// // ... do work ...
/// scope.complete(Event::BatchComplete, &[("writes", "42")]);
/// ```
pub struct ObservationScope<'a> {
    logger: &'a Logger,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
}

impl<'a> ObservationScope<'a> {
    /// Create a scope, logging `begin` with `fields` immediately
    pub fn new(logger: &'a Logger, begin: Event, fields: &[(&'a str, &str)]) -> Self {
        logger.info(begin, fields);

        Self {
            logger,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    /// Mark the scope as successfully completed
    pub fn complete(self, event: Event, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);

        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.extend(extra_fields.iter().copied());

        self.logger.info(event, &all_fields);
    }

    /// Mark the scope as failed with FATAL severity
    pub fn fail(self, event: Event, reason: &str) {
        self.completed.set(true);
        self.logger.fatal(event, &[("reason", reason)]);
    }

    /// Check if the scope has been completed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            self.logger.warn(
                Event::BatchIncomplete,
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
