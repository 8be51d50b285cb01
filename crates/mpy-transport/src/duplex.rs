use crate::{Deadline, Transport, TransportError};
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// An in-memory transport backed by a [`tokio::io::duplex`] pipe.
///
/// Used by tests and by `mpy-emulator` to exercise the protocol engine
/// without real hardware — one end is handed to `RawReplEngine`, the other
/// to a fake device loop.
pub struct DuplexTransport {
    stream: Option<DuplexStream>,
}

impl DuplexTransport {
    #[must_use]
    pub fn new(stream: DuplexStream) -> Self {
        DuplexTransport { stream: Some(stream) }
    }
}

impl Transport for DuplexTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() { Ok(()) } else { Err(TransportError::TransportFailed) }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream = None;
        Ok(())
    }

    async fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(0);
        }
        match tokio::time::timeout(remaining, stream.read(buf)).await {
            Ok(Ok(0)) => Err(TransportError::TransportFailed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_) => Ok(0),
        }
    }

    async fn write_all(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, stream.write_all(bytes))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }

    async fn flush(&mut self, deadline: Deadline) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, stream.flush())
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (a, b) = tokio::io::duplex(64);
        let mut ta = DuplexTransport::new(a);
        let mut tb = DuplexTransport::new(b);

        ta.write_all(b"hello", crate::deadline_in(Duration::from_secs(1)))
            .await
            .unwrap();

        let got = tb.read_exact(5, crate::deadline_in(Duration::from_secs(1))).await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn read_available_returns_zero_on_deadline_with_no_data() {
        let (a, mut _b) = tokio::io::duplex(64);
        let mut ta = DuplexTransport::new(a);
        let mut buf = [0u8; 8];
        let n = ta
            .read_available(&mut buf, crate::deadline_in(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn closed_transport_fails_operations() {
        let (a, _b) = tokio::io::duplex(64);
        let mut ta = DuplexTransport::new(a);
        ta.close().await.unwrap();
        let err = ta
            .write_all(b"x", crate::deadline_in(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::TransportFailed));
    }
}
