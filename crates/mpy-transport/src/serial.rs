use crate::{Deadline, Transport, TransportError};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::debug;

/// Serial port configuration (spec.md §6 serial defaults).
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// OS-specific port identifier, e.g. `COM3` or `/dev/ttyACM0`.
    pub port_name: String,
    pub baud_rate: u32,
}

impl SerialConfig {
    #[must_use]
    pub fn new(port_name: impl Into<String>) -> Self {
        SerialConfig { port_name: port_name.into(), baud_rate: 115_200 }
    }
}

/// A transport backed by a real or virtual serial port.
///
/// `serialport` exposes a blocking API; each operation hands the port to
/// `spawn_blocking` for the duration of one read/write and gets it back —
/// this keeps `SerialTransport` itself free of interior mutability while
/// still presenting the async [`Transport`] contract.
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        SerialTransport { config, port: None }
    }
}

impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.port.is_some() {
            return Ok(());
        }
        let config = self.config.clone();
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(&config.port_name, config.baud_rate)
                .data_bits(serialport::DataBits::Eight)
                .parity(serialport::Parity::None)
                .stop_bits(serialport::StopBits::One)
                .flow_control(serialport::FlowControl::None)
                .timeout(Duration::from_secs(30))
                .open()
        })
        .await
        .map_err(|_| TransportError::TransportFailed)?
        .map_err(|e| match e.kind {
            serialport::ErrorKind::NoDevice => TransportError::AccessDenied(e.description),
            _ => TransportError::Io(std::io::Error::other(e.description)),
        })?;
        debug!(port = %self.config.port_name, baud = self.config.baud_rate, "serial transport opened");
        self.port = Some(port);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.port = None;
        Ok(())
    }

    async fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize, TransportError> {
        let mut port = self.port.take().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            self.port = Some(port);
            return Ok(0);
        }
        let mut chunk = vec![0u8; buf.len()];
        let (port, result) = tokio::task::spawn_blocking(move || {
            let _ = port.set_timeout(remaining);
            let result = port.read(&mut chunk);
            (port, result.map(|n| (n, chunk)))
        })
        .await
        .map_err(|_| TransportError::TransportFailed)?;
        self.port = Some(port);
        match result {
            Ok((n, chunk)) => {
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    async fn write_all(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), TransportError> {
        let mut port = self.port.take().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            self.port = Some(port);
            return Err(TransportError::Timeout);
        }
        let owned = bytes.to_vec();
        let (port, result) = tokio::task::spawn_blocking(move || {
            let _ = port.set_timeout(remaining);
            let result = port.write_all(&owned);
            (port, result)
        })
        .await
        .map_err(|_| TransportError::TransportFailed)?;
        self.port = Some(port);
        result.map_err(|e| {
            if e.kind() == ErrorKind::TimedOut { TransportError::Timeout } else { TransportError::Io(e) }
        })
    }

    async fn flush(&mut self, _deadline: Deadline) -> Result<(), TransportError> {
        let mut port = self.port.take().ok_or(TransportError::TransportFailed)?;
        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = port.flush();
            (port, result)
        })
        .await
        .map_err(|_| TransportError::TransportFailed)?;
        self.port = Some(port);
        result.map_err(TransportError::Io)
    }
}
