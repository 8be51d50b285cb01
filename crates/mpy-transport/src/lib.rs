//! Byte-level transport abstraction (spec.md §4.1).
//!
//! A [`Transport`] is a bidirectional byte stream: a serial port, a spawned
//! interpreter subprocess's stdio, or (for tests) an in-memory duplex pipe.
//! The transport never interprets bytes — framing and protocol state live
//! one layer up, in `mpy-protocol`.

mod duplex;
mod error;
mod serial;
mod subprocess;

pub use duplex::DuplexTransport;
pub use error::TransportError;
pub use serial::{SerialConfig, SerialTransport};
pub use subprocess::{SubprocessConfig, SubprocessTransport};

use std::future::Future;
use std::time::{Duration, Instant};

/// An absolute point in time by which an operation must complete.
///
/// Every transport operation takes an explicit deadline rather than an
/// interval timeout — this is the only suspension-point contract the rest
/// of the engine relies on (spec.md §5).
pub type Deadline = Instant;

/// Build a deadline `timeout` from now.
#[must_use]
pub fn deadline_in(timeout: Duration) -> Deadline {
    Instant::now() + timeout
}

/// Four operations over a bidirectional byte stream.
///
/// All operations are `async` but must never suspend past their deadline:
/// `read_available` returns `Ok(0)` when the deadline expires without data,
/// `read_exact`/`write_all` return [`TransportError::Timeout`].
pub trait Transport: Send {
    /// Open the underlying handle. Idempotent: calling `open` on an
    /// already-open transport is a no-op.
    fn open(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the underlying handle. Safe to call more than once.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read whatever bytes are available into `buf`, returning the count.
    /// Returns `0` if the deadline expires before any byte arrives — this
    /// is not an error, callers retry or give up per their own policy.
    fn read_available(
        &mut self,
        buf: &mut [u8],
        deadline: Deadline,
    ) -> impl Future<Output = Result<usize, TransportError>> + Send;

    /// Read exactly `n` bytes, looping on `read_available` until satisfied.
    /// Missing the deadline with fewer than `n` bytes read is
    /// [`TransportError::Timeout`].
    fn read_exact(
        &mut self,
        n: usize,
        deadline: Deadline,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        async move {
            let mut out = Vec::with_capacity(n);
            let mut chunk = vec![0u8; n];
            while out.len() < n {
                if Instant::now() >= deadline {
                    return Err(TransportError::Timeout);
                }
                let got = self.read_available(&mut chunk[..n - out.len()], deadline).await?;
                if got == 0 {
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout);
                    }
                    continue;
                }
                out.extend_from_slice(&chunk[..got]);
            }
            Ok(out)
        }
    }

    /// Write the full buffer, blocking (within the deadline) until every
    /// byte is accepted by the underlying handle.
    fn write_all(&mut self, bytes: &[u8], deadline: Deadline) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Flush any buffered writes.
    fn flush(&mut self, deadline: Deadline) -> impl Future<Output = Result<(), TransportError>> + Send;
}
