//! Logging infrastructure for tsmerge.
//!
//! All events go through `tracing` with target "tsmerge" and carry an `event`
//! field for filtering. The crate never installs a global subscriber;
//! applications configure one via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem emitting the event ("planner", "merge")
//! - Use `%` for Display, `?` for Debug formatting

/// Target for all tsmerge log events.
pub(crate) const TSMERGE_TARGET: &str = "tsmerge";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "planner",
///     event = "compaction_group_excluded",
///     block = %meta.id,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::TSMERGE_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::TSMERGE_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::TSMERGE_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::TSMERGE_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
