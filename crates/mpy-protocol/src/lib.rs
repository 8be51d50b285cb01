//! Raw / Raw-Paste REPL protocol engine (spec.md §4.2).
//!
//! `RawReplEngine<T>` produces the correct, ordered byte sequences to bring
//! a MicroPython-family device to a known state, execute one fragment, and
//! return to idle. It does not interpret the response beyond framing —
//! classification and value extraction are `mpy-parser`'s job.

mod control;
mod engine;
mod error;

pub use control::{ENQ, EOT, ETX, SOH, STX, TERMINATOR};
pub use engine::{RawOutput, RawPasteOutcome, RawReplEngine};
pub use error::ProtocolError;

/// Protocol state internal to the engine (spec.md §3).
///
/// Invariant: at most one state per transport at any time; transitions are
/// driven exclusively by [`RawReplEngine`] methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Normal,
    Raw,
    RawPaste,
}
