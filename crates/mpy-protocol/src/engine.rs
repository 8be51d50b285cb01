use crate::control::{ENQ, EOT, SOH, STX, TERMINATOR};
use crate::{ProtocolError, ProtocolState};
use mpy_transport::{Deadline, Transport, deadline_in};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// The framed payload of a completed execute (output region + error region
/// + trailing prompt, still undivided — `mpy-parser` splits it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub payload: Vec<u8>,
}

/// Result of attempting a raw-paste execute.
#[derive(Debug)]
pub enum RawPasteOutcome {
    /// The device does not speak raw-paste; the caller should fall back to
    /// [`RawReplEngine::execute_raw`] for this call.
    Unsupported,
    /// The transfer completed and produced a framed response.
    Executed(RawOutput),
}

/// Bound on how much unterminated device output the engine will buffer
/// before giving up — guards against a device that never sends the
/// expected marker.
const READ_BUFFER_CAP: usize = 64 * 1024;

/// Drives the Raw / Raw-Paste sub-protocols over a single [`Transport`].
///
/// Not internally synchronized: the caller (the Session Orchestrator)
/// guarantees exactly one active operation at a time (spec.md §4.2
/// "Concurrency").
pub struct RawReplEngine<T: Transport> {
    transport: T,
    state: ProtocolState,
}

impl<T: Transport> RawReplEngine<T> {
    pub fn new(transport: T) -> Self {
        RawReplEngine { transport, state: ProtocolState::Normal }
    }

    #[must_use]
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Bring the device to a known `Normal` state: settle, drain, send an
    /// interrupt, drain again. Idempotent.
    pub async fn init(&mut self, settle: Duration, timeout: Duration) -> Result<(), ProtocolError> {
        self.transport.open().await?;
        tokio::time::sleep(settle).await;
        self.drain(deadline_in(Duration::from_millis(200))).await?;
        self.transport.write_all(&[b'\r', crate::control::ETX], deadline_in(timeout)).await?;
        self.drain(deadline_in(Duration::from_millis(200))).await?;
        self.state = ProtocolState::Normal;
        Ok(())
    }

    /// Send `SOH` and wait for the `raw REPL` banner.
    pub async fn enter_raw(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        self.transport.write_all(&[SOH], deadline_in(timeout)).await?;
        self.read_until_contains(b"raw REPL", deadline_in(timeout))
            .await
            .map_err(|_| ProtocolError::ProtocolMismatch { expected: ProtocolState::Raw, actual: self.state })?;
        self.state = ProtocolState::Raw;
        Ok(())
    }

    /// Send `STX` and wait for the interactive prompt. Transitions to `Normal`
    /// even if the prompt never arrives within `timeout` — this is the
    /// best-effort recovery path other operations fall back to.
    pub async fn exit_raw(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        self.transport.write_all(&[STX], deadline_in(timeout)).await?;
        let _ = self.read_until_contains(b">>>", deadline_in(timeout)).await;
        self.state = ProtocolState::Normal;
        Ok(())
    }

    /// Send `ETX` to interrupt a running program. Does not itself change
    /// protocol state.
    pub async fn interrupt(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        self.transport.write_all(&[crate::control::ETX], deadline_in(timeout)).await?;
        Ok(())
    }

    /// Plain Raw execute (spec.md §4.2 "Plain Raw execute"). Precondition:
    /// `state() == Raw`.
    pub async fn execute_raw(&mut self, code: &[u8], ack_timeout: Duration, exec_deadline: Deadline) -> Result<RawOutput, ProtocolError> {
        self.transport.write_all(code, exec_deadline).await?;
        self.transport.write_all(&[EOT], exec_deadline).await?;
        let ack = self
            .transport
            .read_exact(2, deadline_in(ack_timeout))
            .await
            .map_err(|_| ProtocolError::ProtocolMismatch { expected: ProtocolState::Raw, actual: self.state })?;
        if ack != b"OK" {
            return Err(ProtocolError::ProtocolMismatch { expected: ProtocolState::Raw, actual: self.state });
        }
        let payload = self.read_until_terminator(exec_deadline).await?;
        Ok(RawOutput { payload })
    }

    /// Windowed Raw-Paste execute (spec.md §4.2 "Raw-Paste execute").
    /// Precondition: `state() == Raw`.
    pub async fn execute_raw_paste(
        &mut self,
        code: &[u8],
        ack_timeout: Duration,
        exec_deadline: Deadline,
    ) -> Result<RawPasteOutcome, ProtocolError> {
        match self.execute_raw_paste_inner(code, ack_timeout, exec_deadline).await {
            Ok(RawPasteOutcome::Unsupported) => {
                // Handshake never entered RawPaste — nothing to unwind.
                Ok(RawPasteOutcome::Unsupported)
            }
            other => {
                // We engaged RawPaste (or tried to); unconditionally return
                // to Raw then exit to Normal, per spec.md §4.2 step 6.
                self.state = ProtocolState::Raw;
                let _ = self.exit_raw(Duration::from_millis(500)).await;
                other
            }
        }
    }

    async fn execute_raw_paste_inner(
        &mut self,
        code: &[u8],
        ack_timeout: Duration,
        exec_deadline: Deadline,
    ) -> Result<RawPasteOutcome, ProtocolError> {
        self.transport.write_all(&[ENQ, b'A', SOH], exec_deadline).await?;

        let first = self.transport.read_exact(1, deadline_in(ack_timeout)).await?[0];
        if first != b'R' {
            debug!(byte = first, "device does not advertise raw-paste support");
            return Ok(RawPasteOutcome::Unsupported);
        }
        let second = self.transport.read_exact(1, deadline_in(ack_timeout)).await?[0];
        if second != 0x01 {
            return Err(ProtocolError::ProtocolMismatch { expected: ProtocolState::RawPaste, actual: self.state });
        }
        let window_bytes = self.transport.read_exact(2, deadline_in(ack_timeout)).await?;
        let window = u16::from_le_bytes([window_bytes[0], window_bytes[1]]);
        self.state = ProtocolState::RawPaste;
        trace!(window, "raw-paste window negotiated");

        let mut credit = window;
        let mut sent = 0usize;
        while sent < code.len() {
            if credit == 0 {
                let b = self.transport.read_exact(1, deadline_in(ack_timeout)).await?[0];
                match b {
                    0x01 => credit = credit.saturating_add(window),
                    EOT => return Err(ProtocolError::TransportAbort),
                    other => return Err(ProtocolError::FlowControlViolation { byte: other, credit }),
                }
                continue;
            }
            let chunk_len = (credit as usize).min(code.len() - sent);
            self.transport.write_all(&code[sent..sent + chunk_len], exec_deadline).await?;
            sent += chunk_len;
            credit -= chunk_len as u16;
        }

        self.transport.write_all(&[EOT], exec_deadline).await?;
        let payload = self.read_until_terminator(exec_deadline).await?;
        Ok(RawPasteOutcome::Executed(RawOutput { payload }))
    }

    async fn drain(&mut self, deadline: Deadline) -> Result<(), ProtocolError> {
        let mut buf = [0u8; 256];
        loop {
            if Instant::now() >= deadline {
                return Ok(());
            }
            let n = self.transport.read_available(&mut buf, deadline).await?;
            if n == 0 {
                return Ok(());
            }
        }
    }

    async fn read_until_contains(&mut self, needle: &[u8], deadline: Deadline) -> Result<(), ProtocolError> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            if buf.windows(needle.len()).any(|w| w == needle) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ProtocolError::Timeout);
            }
            let n = self.transport.read_available(&mut chunk, deadline).await?;
            if n > 0 {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > READ_BUFFER_CAP {
                    warn!("read_until_contains exceeded buffer cap without finding marker");
                    return Err(ProtocolError::Timeout);
                }
            }
        }
    }

    async fn read_until_terminator(&mut self, deadline: Deadline) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            if buf.len() >= TERMINATOR.len() && buf[buf.len() - TERMINATOR.len()..] == TERMINATOR[..] {
                buf.truncate(buf.len() - TERMINATOR.len());
                return Ok(buf);
            }
            if Instant::now() >= deadline {
                // Best-effort: try to nudge the device back to Normal.
                let _ = self.transport.write_all(&[STX], deadline_in(Duration::from_millis(200))).await;
                return Err(ProtocolError::Timeout);
            }
            let n = self.transport.read_available(&mut chunk, deadline).await?;
            if n > 0 {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > READ_BUFFER_CAP {
                    return Err(ProtocolError::Timeout);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpy_transport::DuplexTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn pair() -> (RawReplEngine<DuplexTransport>, DuplexStream) {
        let (host, device) = tokio::io::duplex(4096);
        (RawReplEngine::new(DuplexTransport::new(host)), device)
    }

    #[tokio::test]
    async fn enter_raw_detects_banner() {
        let (mut engine, mut device) = pair();
        let device_task = tokio::spawn(async move {
            let mut byte = [0u8; 1];
            device.read_exact(&mut byte).await.unwrap();
            assert_eq!(byte[0], SOH);
            device.write_all(b"raw REPL; CTRL-B to exit\r\n>").await.unwrap();
        });
        engine.enter_raw(Duration::from_secs(1)).await.unwrap();
        assert_eq!(engine.state(), ProtocolState::Raw);
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn enter_raw_without_banner_is_mismatch() {
        let (mut engine, mut device) = pair();
        tokio::spawn(async move {
            let mut byte = [0u8; 1];
            let _ = device.read_exact(&mut byte).await;
            device.write_all(b"garbage").await.unwrap();
            // keep the write end alive until the test's timeout expires
            tokio::time::sleep(Duration::from_secs(2)).await;
        });
        let err = engine.enter_raw(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolMismatch { .. }));
    }

    #[tokio::test]
    async fn execute_raw_happy_path() {
        let (mut engine, mut device) = pair();
        engine.state = ProtocolState::Raw;
        let device_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 64];
            let n = device.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"1+1");
            let mut eot = [0u8; 1];
            device.read_exact(&mut eot).await.unwrap();
            assert_eq!(eot[0], EOT);
            device.write_all(b"OK2\x04\x04>").await.unwrap();
        });
        let out = engine
            .execute_raw(b"1+1", Duration::from_secs(1), deadline_in(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(out.payload, b"2");
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn execute_raw_missing_ack_is_mismatch() {
        let (mut engine, mut device) = pair();
        engine.state = ProtocolState::Raw;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 64];
            let _ = device.read(&mut buf).await;
            device.write_all(b"NO").await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });
        let err = engine
            .execute_raw(b"1+1", Duration::from_millis(100), deadline_in(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolMismatch { .. }));
    }

    #[tokio::test]
    async fn raw_paste_falls_back_when_unsupported() {
        let (mut engine, mut device) = pair();
        engine.state = ProtocolState::Raw;
        tokio::spawn(async move {
            let mut probe = [0u8; 3];
            device.read_exact(&mut probe).await.unwrap();
            assert_eq!(probe, [ENQ, b'A', SOH]);
            device.write_all(b"x").await.unwrap();
        });
        let outcome = engine
            .execute_raw_paste(b"42", Duration::from_secs(1), deadline_in(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(matches!(outcome, RawPasteOutcome::Unsupported));
        assert_eq!(engine.state(), ProtocolState::Raw, "fallback must leave the engine in Raw");
    }

    #[tokio::test]
    async fn raw_paste_window_boundary_no_intermediate_read() {
        let (mut engine, mut device) = pair();
        engine.state = ProtocolState::Raw;
        let code = b"ab".to_vec(); // exactly matches the advertised window below
        let device_task = tokio::spawn(async move {
            let mut probe = [0u8; 3];
            device.read_exact(&mut probe).await.unwrap();
            device.write_all(&[b'R', 0x01, 2, 0]).await.unwrap(); // window = 2
            let mut body = [0u8; 2];
            device.read_exact(&mut body).await.unwrap();
            assert_eq!(&body, b"ab");
            let mut eot = [0u8; 1];
            device.read_exact(&mut eot).await.unwrap();
            assert_eq!(eot[0], EOT);
            device.write_all(b"\x04\x04>").await.unwrap();
            // device exits raw on STX from the engine's post-paste cleanup
            let mut stx = [0u8; 1];
            device.read_exact(&mut stx).await.unwrap();
            device.write_all(b">>>").await.unwrap();
        });
        let outcome = engine
            .execute_raw_paste(&code, Duration::from_secs(1), deadline_in(Duration::from_secs(1)))
            .await
            .unwrap();
        match outcome {
            RawPasteOutcome::Executed(out) => assert_eq!(out.payload, b""),
            RawPasteOutcome::Unsupported => panic!("expected support"),
        }
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn raw_paste_abort_on_eot_during_flow_control() {
        let (mut engine, mut device) = pair();
        engine.state = ProtocolState::Raw;
        let code = vec![b'x'; 4];
        tokio::spawn(async move {
            let mut probe = [0u8; 3];
            device.read_exact(&mut probe).await.unwrap();
            device.write_all(&[b'R', 0x01, 2, 0]).await.unwrap(); // window = 2, code is longer
            let mut body = [0u8; 2];
            device.read_exact(&mut body).await.unwrap();
            device.write_all(&[EOT]).await.unwrap();
        });
        let err = engine
            .execute_raw_paste(&code, Duration::from_secs(1), deadline_in(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::TransportAbort));
    }
}
