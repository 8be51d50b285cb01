use crate::{Deadline, Transport, TransportError};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Configuration for a spawned-interpreter transport (spec.md §6 subprocess defaults).
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Executable path, resolved against `PATH` if not absolute.
    pub executable: PathBuf,
    /// Extra arguments appended after the mandatory `-i`.
    pub extra_args: Vec<String>,
}

impl SubprocessConfig {
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        SubprocessConfig { executable: executable.into(), extra_args: Vec::new() }
    }
}

/// A transport backed by a spawned interpreter subprocess's stdio.
pub struct SubprocessTransport {
    config: SubprocessConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl SubprocessTransport {
    #[must_use]
    pub fn new(config: SubprocessConfig) -> Self {
        SubprocessTransport { config, child: None, stdin: None, stdout: None }
    }
}

impl Transport for SubprocessTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.child.is_some() {
            return Ok(());
        }
        let mut cmd = Command::new(&self.config.executable);
        cmd.arg("-i")
            .args(&self.config.extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or(TransportError::TransportFailed)?;
        let stdout = child.stdout.take().ok_or(TransportError::TransportFailed)?;
        debug!(executable = %self.config.executable.display(), "subprocess transport opened");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill subprocess cleanly");
            }
        }
        Ok(())
    }

    async fn read_available(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize, TransportError> {
        let stdout = self.stdout.as_mut().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(0);
        }
        match tokio::time::timeout(remaining, stdout.read(buf)).await {
            Ok(Ok(0)) => Err(TransportError::TransportFailed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_) => Ok(0),
        }
    }

    async fn write_all(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, stdin.write_all(bytes))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }

    async fn flush(&mut self, deadline: Deadline) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::TransportFailed)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, stdin.flush())
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }
}
