//! Response parsing and error classification (spec.md §4.3).
//!
//! Turns the raw bytes handed back by [`mpy_protocol::RawReplEngine`] into a
//! [`ResultRecord`]: framing stripped, output/error regions separated,
//! failures classified against a fixed taxonomy, line numbers extracted.
//! This module never touches the transport or the protocol state machine.

mod classify;
mod frame;
mod record;
mod wrap;

pub use classify::{classify_error_region, classify_with_output_guard, ErrorKind};
pub use frame::{split_frame, FramedParts};
pub use record::ResultRecord;
pub use wrap::wrap_if_expression;
