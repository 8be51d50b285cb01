use crate::ProtocolState;
use mpy_transport::TransportError;
use thiserror::Error;

/// Failures raised by the protocol engine (spec.md §4.2, §7).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The device's response did not match what the requested transition expects.
    #[error("protocol mismatch: expected {expected:?}, actual {actual:?}")]
    ProtocolMismatch { expected: ProtocolState, actual: ProtocolState },
    /// A phase deadline expired.
    #[error("timed out waiting for device response")]
    Timeout,
    /// The device sent `EOT` during a raw-paste flow-control wait.
    #[error("device aborted transfer during flow control")]
    TransportAbort,
    /// The device sent a byte other than `0x01`/`EOT` during flow control.
    #[error("flow control violation: unexpected byte {byte:#04x} with {credit} credit remaining")]
    FlowControlViolation { byte: u8, credit: u16 },
    /// A transport-level failure propagated from below.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}
