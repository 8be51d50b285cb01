//! Connection state and observer event payloads (spec.md §3, §6).

use std::time::SystemTime;

/// Session connection state. Monotonic except `Reconnecting→Connected` and
/// `Error→Connecting`. `Executing` is only reachable from `Connected` and
/// returns to `Connected` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Executing,
    Reconnecting,
    Error,
}

/// Delivered to every registered state listener on each transition.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StateEvent {
    pub old: ConnectionState,
    pub new: ConnectionState,
    pub reason: Option<String>,
    pub cause: Option<String>,
}

/// Delivered to every registered output listener for each device stdout
/// chunk produced during an `execute`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OutputEvent {
    pub text: String,
    pub is_error: bool,
    #[serde(skip, default = "SystemTime::now")]
    pub timestamp: SystemTime,
}
