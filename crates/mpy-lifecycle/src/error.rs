//! Lifecycle-level errors (spec.md §4.6). Each variant wraps the underlying
//! [`SessionError`] that `mpy-session` raised for the failing operation.

use mpy_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("setup operation '{name}' failed: {source}")]
    SetupFailed { name: String, source: SessionError },

    #[error("task '{name}' is not declared")]
    UnknownTask { name: String },

    #[error("task '{name}' failed: {source}")]
    TaskFailed { name: String, source: SessionError },

    #[error("thread '{name}' is not declared")]
    UnknownThread { name: String },

    #[error("thread '{name}' failed to start: {source}")]
    ThreadStartFailed { name: String, source: SessionError },

    #[error("thread '{name}' failed to stop: {source}")]
    ThreadStopFailed { name: String, source: SessionError },

    #[error("teardown operation '{name}' failed: {source}")]
    TeardownFailed { name: String, source: SessionError },
}
