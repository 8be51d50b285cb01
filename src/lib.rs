//! Host-side driver library for MicroPython-family devices: opens a byte
//! transport (serial port or spawned interpreter subprocess), drives the
//! Raw/Raw-Paste REPL protocol over it, and exposes a typed `execute`/
//! `execute_typed` API plus declarative lifecycle scheduling.
//!
//! Most callers only need [`Device`] and [`DeviceFactory`]; the underlying
//! `mpy-transport`/`mpy-protocol`/`mpy-parser`/`mpy-validator`/`mpy-convert`/
//! `mpy-session`/`mpy-lifecycle` crates are re-exported for callers who need
//! to compose the pieces themselves (e.g. to run a `Session` against a
//! custom `TransportFactory`).

mod connection;
mod device;

pub use connection::{ConnectionStringError, DeviceFactory, DeviceTransport};
pub use device::{Device, DeviceError};

pub use mpy_convert::{convert, ConversionFailed, ConvertText};
pub use mpy_lifecycle::{LifecycleCoordinator, LifecycleDeclaration, LifecycleError, SetupOp, TaskOp, TeardownOp, ThreadOp};
pub use mpy_parser::{ErrorKind, ResultRecord};
pub use mpy_session::{
    CancelSignal, CapabilitySnapshot, ConnectionState, ErrorContext, Feature, OutputEvent, ReconnectPolicy, Session,
    SessionConfig, SessionError, StateEvent, SubscriptionHandle, TimeoutProfile, TransportFactory,
};
pub use mpy_transport::{Deadline, Transport, TransportError};
pub use mpy_validator::ValidatorPolicy;
