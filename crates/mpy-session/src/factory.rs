//! Reopening a transport on connect/reconnect (spec.md §4.5).

use mpy_transport::{Transport, TransportError};
use std::future::Future;
use std::sync::Arc;

/// Produces a fresh, unopened transport instance. The `Session` calls
/// `open` once on `connect()` and again on every reconnect attempt, since a
/// failed transport cannot generally be reused.
pub trait TransportFactory: Send + Sync {
    type Transport: Transport + Send;

    fn open(&self) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Lets a `Session` share its factory with whoever else needs to reach it
/// (e.g. a test harness calling `DuplexFactory::sever_current`), by handing
/// `Session::new` an `Arc<F>` instead of an owned `F`.
impl<F: TransportFactory> TransportFactory for Arc<F> {
    type Transport = F::Transport;

    fn open(&self) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send {
        (**self).open()
    }
}
