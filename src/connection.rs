//! Connection string grammar and the transport factory it resolves to
//! (spec.md §6): `<scheme>:<parameter>`, scheme ∈ {`serial`, `subprocess`}.

use mpy_session::TransportFactory;
use mpy_transport::{
    Deadline, SerialConfig, SerialTransport, SubprocessConfig, SubprocessTransport, Transport, TransportError,
};
use std::fmt;

/// A connection string failed to resolve to a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionStringError {
    #[error("invalid connection string: {0:?}")]
    InvalidConnectionString(String),
    #[error("unsupported connection scheme: {0:?}")]
    UnsupportedScheme(String),
}

/// One of `serial:<port>` or `subprocess:<path>`, resolved from a
/// connection string and ready to hand to [`Session::new`](mpy_session::Session::new).
#[derive(Debug, Clone)]
pub enum DeviceFactory {
    Serial(SerialConfig),
    Subprocess(SubprocessConfig),
}

impl DeviceFactory {
    /// Parse `<scheme>:<parameter>`. A missing `:` or empty parameter is
    /// [`ConnectionStringError::InvalidConnectionString`]; a scheme other
    /// than `serial`/`subprocess` is [`ConnectionStringError::UnsupportedScheme`].
    pub fn parse(connection_string: &str) -> Result<DeviceFactory, ConnectionStringError> {
        let (scheme, parameter) = connection_string
            .split_once(':')
            .ok_or_else(|| ConnectionStringError::InvalidConnectionString(connection_string.to_string()))?;
        if parameter.is_empty() {
            return Err(ConnectionStringError::InvalidConnectionString(connection_string.to_string()));
        }
        match scheme {
            "serial" => Ok(DeviceFactory::Serial(SerialConfig::new(parameter))),
            "subprocess" => Ok(DeviceFactory::Subprocess(SubprocessConfig::new(parameter))),
            other => Err(ConnectionStringError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFactory::Serial(c) => write!(f, "serial:{}", c.port_name),
            DeviceFactory::Subprocess(c) => write!(f, "subprocess:{}", c.executable.display()),
        }
    }
}

impl TransportFactory for DeviceFactory {
    type Transport = DeviceTransport;

    async fn open(&self) -> Result<DeviceTransport, TransportError> {
        match self {
            DeviceFactory::Serial(config) => Ok(DeviceTransport::Serial(SerialTransport::new(config.clone()))),
            DeviceFactory::Subprocess(config) => {
                Ok(DeviceTransport::Subprocess(SubprocessTransport::new(config.clone())))
            }
        }
    }
}

/// Either real transport kind, so [`DeviceFactory`] can implement
/// `TransportFactory` with a single associated type.
pub enum DeviceTransport {
    Serial(SerialTransport),
    Subprocess(SubprocessTransport),
}

impl Transport for DeviceTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Serial(t) => t.open().await,
            DeviceTransport::Subprocess(t) => t.open().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Serial(t) => t.close().await,
            DeviceTransport::Subprocess(t) => t.close().await,
        }
    }

    async fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize, TransportError> {
        match self {
            DeviceTransport::Serial(t) => t.read_available(buf, deadline).await,
            DeviceTransport::Subprocess(t) => t.read_available(buf, deadline).await,
        }
    }

    async fn write_all(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Serial(t) => t.write_all(bytes, deadline).await,
            DeviceTransport::Subprocess(t) => t.write_all(bytes, deadline).await,
        }
    }

    async fn flush(&mut self, deadline: Deadline) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Serial(t) => t.flush(deadline).await,
            DeviceTransport::Subprocess(t) => t.flush(deadline).await,
        }
    }
}
