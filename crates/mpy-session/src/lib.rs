//! Session orchestrator (spec.md §4.5): owns the protocol engine, serializes
//! execution through a single permit, tracks connection state, and drives
//! reconnection with capped exponential backoff and bounded history replay.

mod cancel;
mod capability;
mod config;
mod error;
mod factory;
mod file_transfer;
mod observer;
mod session;
mod state;

pub use cancel::CancelSignal;
pub use capability::{CapabilitySnapshot, Feature};
pub use config::{ReconnectPolicy, SessionConfig, TimeoutProfile};
pub use error::{ErrorContext, SessionError};
pub use factory::TransportFactory;
pub use observer::SubscriptionHandle;
pub use session::Session;
pub use state::{ConnectionState, OutputEvent, StateEvent};
