//! [`TransportFactory`] backed by [`FakeDevice`] instead of real hardware.

use crate::device::FakeDevice;
use mpy_session::TransportFactory;
use mpy_transport::{DuplexTransport, TransportError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Hands out a fresh `FakeDevice` + `DuplexTransport` pair on every `open()`
/// call, the same way a real factory reopens a serial port or respawns a
/// subprocess on reconnect. Also exposes [`DuplexFactory::sever_current`] so
/// integration tests can inject a transport failure deterministically.
pub struct DuplexFactory {
    supports_raw_paste: bool,
    current_device: Mutex<Option<AbortHandle>>,
}

impl DuplexFactory {
    pub fn new(supports_raw_paste: bool) -> Arc<DuplexFactory> {
        Arc::new(DuplexFactory { supports_raw_paste, current_device: Mutex::new(None) })
    }

    /// Abort the device task backing the most recently opened transport,
    /// dropping its end of the duplex pipe. The host's next read surfaces
    /// this as [`mpy_transport::TransportError::TransportFailed`].
    pub async fn sever_current(&self) {
        if let Some(handle) = self.current_device.lock().await.take() {
            handle.abort();
        }
    }
}

impl TransportFactory for DuplexFactory {
    type Transport = DuplexTransport;

    async fn open(&self) -> Result<DuplexTransport, TransportError> {
        let (host, device) = tokio::io::duplex(8192);
        let fake = FakeDevice::new(self.supports_raw_paste);
        let handle = tokio::spawn(fake.run(device)).abort_handle();
        *self.current_device.lock().await = Some(handle);
        Ok(DuplexTransport::new(host))
    }
}
