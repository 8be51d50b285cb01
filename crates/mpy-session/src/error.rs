//! Unified error surface (spec.md §7) — the public error type for this crate.
//! Component-level errors from `mpy-transport`/`mpy-protocol`/`mpy-convert`
//! convert into this via `#[from]`, matching `services/receiver/src/session.rs`'s
//! `SessionError`.

use mpy_convert::ConversionFailed;
use mpy_parser::ErrorKind as DeviceErrorKind;
use mpy_protocol::ProtocolError;
use mpy_transport::TransportError;
use std::collections::HashMap;
use std::time::SystemTime;
use thiserror::Error;

/// Context attached to every surfaced error (spec.md §7): a stable code, the
/// originating component, a timestamp, and a free-form context map.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: &'static str,
    pub component: &'static str,
    pub timestamp: SystemTime,
    pub fields: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(code: &'static str, component: &'static str) -> ErrorContext {
        ErrorContext { code, component, timestamp: SystemTime::now(), fields: HashMap::new() }
    }

    pub fn with_fragment(mut self, fragment: &str) -> ErrorContext {
        let truncated: String = fragment.chars().take(200).collect();
        self.fields.insert("fragment".to_string(), truncated);
        self
    }

    pub fn with_field(mut self, key: &str, value: impl ToString) -> ErrorContext {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }
}

/// The error kinds of spec.md §7, collapsed onto one enum: the parser's
/// device-side taxonomy plus the session/protocol/transport kinds.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation rejected the fragment: {reason}")]
    Validation { reason: String, concerns: Vec<String>, context: ErrorContext },

    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(ProtocolError, ErrorContext),

    #[error("operation timed out")]
    Timeout(ErrorContext),

    #[error("transport failure: {0}")]
    TransportFailed(TransportError, ErrorContext),

    #[error("flow control violation")]
    FlowControlViolation(ErrorContext),

    #[error("failed to connect: {cause}")]
    ConnectionFailed { cause: String, context: ErrorContext },

    #[error("reconnection exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32, context: ErrorContext },

    #[error("execution cancelled")]
    Cancelled(ErrorContext),

    #[error("device raised a SyntaxError-family exception: {message}")]
    DeviceSyntax { message: String, line_number: Option<u32>, context: ErrorContext },

    #[error("device raised a runtime exception: {message}")]
    DeviceRuntime { message: String, line_number: Option<u32>, context: ErrorContext },

    #[error("device ran out of memory: {message}")]
    DeviceMemory { message: String, line_number: Option<u32>, context: ErrorContext },

    #[error("device filesystem error: {message}")]
    DeviceFileSystem { message: String, line_number: Option<u32>, context: ErrorContext },

    #[error("device import error: {message}")]
    DeviceImport { message: String, line_number: Option<u32>, context: ErrorContext },

    #[error("device execution was interrupted: {message}")]
    DeviceInterrupted { message: String, line_number: Option<u32>, context: ErrorContext },

    #[error("result conversion failed: {0}")]
    ConversionFailed(ConversionFailed, ErrorContext),

    #[error("remote file not found: {remote_path}")]
    FileNotFound { remote_path: String, context: ErrorContext },

    #[error("unclassified device error: {message}")]
    Unknown { message: String, line_number: Option<u32>, context: ErrorContext },
}

impl SessionError {
    /// Build a `Device*` variant from a parser [`DeviceErrorKind`] plus the
    /// stderr text and line number already extracted by `mpy-parser`.
    pub(crate) fn from_device_error(
        kind: DeviceErrorKind,
        message: String,
        line_number: Option<u32>,
        context: ErrorContext,
    ) -> SessionError {
        match kind {
            DeviceErrorKind::Syntax => SessionError::DeviceSyntax { message, line_number, context },
            DeviceErrorKind::Runtime => SessionError::DeviceRuntime { message, line_number, context },
            DeviceErrorKind::Memory => SessionError::DeviceMemory { message, line_number, context },
            DeviceErrorKind::FileSystem => SessionError::DeviceFileSystem { message, line_number, context },
            DeviceErrorKind::Import => SessionError::DeviceImport { message, line_number, context },
            DeviceErrorKind::Interrupted => SessionError::DeviceInterrupted { message, line_number, context },
            DeviceErrorKind::Timeout => SessionError::Timeout(context),
            DeviceErrorKind::Transport | DeviceErrorKind::Unknown | DeviceErrorKind::None => {
                SessionError::Unknown { message, line_number, context }
            }
        }
    }

    /// Whether the underlying condition is expected to clear on retry.
    pub fn recoverable(&self) -> bool {
        match self {
            SessionError::DeviceMemory { .. } | SessionError::DeviceFileSystem { .. } => false,
            SessionError::Validation { .. } | SessionError::Cancelled(_) => true,
            _ => true,
        }
    }
}
