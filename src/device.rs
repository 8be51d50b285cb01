//! `Device`: a thin convenience wrapper tying `mpy-session`'s orchestrator
//! to `mpy-lifecycle`'s coordinator behind one connection string.

use crate::connection::{ConnectionStringError, DeviceFactory};
use mpy_convert::ConvertText;
use mpy_lifecycle::{LifecycleCoordinator, LifecycleDeclaration, LifecycleError};
use mpy_parser::ResultRecord;
use mpy_session::{
    CancelSignal, CapabilitySnapshot, ConnectionState, OutputEvent, Session, SessionConfig, SessionError, StateEvent,
    SubscriptionHandle,
};
use std::sync::Arc;
use std::time::Duration;

/// Failure constructing a [`Device`] before any session I/O happens.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error(transparent)]
    ConnectionString(#[from] ConnectionStringError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A MicroPython-family device reachable over a connection string, with its
/// declared lifecycle (setup/task/thread/teardown fragments) attached.
pub struct Device {
    session: Arc<Session<DeviceFactory>>,
    lifecycle: LifecycleCoordinator<DeviceFactory>,
}

impl Device {
    /// Parse `connection_string`, construct a [`Session`], and connect.
    pub async fn connect(connection_string: &str, config: SessionConfig) -> Result<Device, DeviceError> {
        Device::connect_with_lifecycle(connection_string, config, LifecycleDeclaration::new()).await
    }

    pub async fn connect_with_lifecycle(
        connection_string: &str,
        config: SessionConfig,
        declaration: LifecycleDeclaration,
    ) -> Result<Device, DeviceError> {
        let factory = DeviceFactory::parse(connection_string)?;
        let session = Session::new(factory, config);
        session.connect().await?;
        let lifecycle = LifecycleCoordinator::new(Arc::clone(&session), declaration);
        Ok(Device { session, lifecycle })
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.session.disconnect().await
    }

    pub async fn state(&self) -> ConnectionState {
        self.session.state().await
    }

    pub async fn capability(&self) -> Option<CapabilitySnapshot> {
        self.session.capability().await
    }

    pub fn subscribe_output(&self, callback: impl Fn(&OutputEvent) + Send + Sync + 'static) -> SubscriptionHandle<OutputEvent> {
        self.session.subscribe_output(callback)
    }

    pub fn subscribe_state(&self, callback: impl Fn(&StateEvent) + Send + Sync + 'static) -> SubscriptionHandle<StateEvent> {
        self.session.subscribe_state(callback)
    }

    pub async fn execute(&self, code: &str, cancel: Option<CancelSignal>) -> Result<ResultRecord, SessionError> {
        self.session.execute(code, cancel).await
    }

    pub async fn execute_with_timeout(
        &self,
        code: &str,
        cancel: Option<CancelSignal>,
        timeout: Option<Duration>,
    ) -> Result<ResultRecord, SessionError> {
        self.session.execute_with_timeout(code, cancel, timeout).await
    }

    pub async fn execute_typed<T: ConvertText>(&self, code: &str, cancel: Option<CancelSignal>) -> Result<T, SessionError> {
        self.session.execute_typed(code, cancel).await
    }

    pub async fn put_file(&self, remote_path: &str, bytes: &[u8]) -> Result<(), SessionError> {
        self.session.put_file(remote_path, bytes).await
    }

    pub async fn get_file(&self, remote_path: &str) -> Result<Vec<u8>, SessionError> {
        self.session.get_file(remote_path).await
    }

    /// Run every declared Setup operation, in order.
    pub async fn setup(&self) -> Result<(), LifecycleError> {
        self.lifecycle.setup().await
    }

    pub async fn invoke_task(&self, name: &str, cancel: Option<CancelSignal>) -> Result<ResultRecord, LifecycleError> {
        self.lifecycle.invoke_task(name, cancel).await
    }

    pub async fn start_thread(&self, name: &str) -> Result<(), LifecycleError> {
        self.lifecycle.start_thread(name).await
    }

    pub async fn stop_thread(&self, name: &str) -> Result<(), LifecycleError> {
        self.lifecycle.stop_thread(name).await
    }

    pub async fn running_threads(&self) -> Vec<String> {
        self.lifecycle.running_threads().await
    }

    /// Run every declared Teardown operation, then disconnect.
    pub async fn teardown(&self) -> Result<(), LifecycleError> {
        let result = self.lifecycle.teardown().await;
        let _ = self.session.disconnect().await;
        result
    }
}
