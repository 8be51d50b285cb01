//! The orchestrator itself (spec.md §4.5). Owns the protocoal engine, the
//! transport, the history buffer, and the connection-state field behind a
//! single `tokio::sync::Mutex` — acquiring that lock *is* acquiring the
//! execution permit (spec.md §5: "the permit is the only lock").

use crate::cancel::CancelSignal;
use crate::capability::{CapabilitySnapshot, ProbeResponse};
use crate::config::SessionConfig;
use crate::error::{ErrorContext, SessionError};
use crate::factory::TransportFactory;
use crate::file_transfer::{self, FILE_NOT_FOUND_SENTINEL};
use crate::observer::{Observer, SubscriptionHandle};
use crate::state::{ConnectionState, OutputEvent, StateEvent};
use mpy_convert::{convert, ConvertText};
use mpy_parser::{wrap_if_expression, ResultRecord};
use mpy_protocol::{ProtocolError, ProtocolState, RawPasteOutcome, RawReplEngine, EOT, ETX};
use mpy_transport::{deadline_in, Transport};
use mpy_validator::validate;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const PROBE_FRAGMENT: &str = "import sys, gc, json\n\
features = []\n\
try:\n\
\timport machine\n\
\tfeatures.append('GPIO')\n\
except ImportError:\n\
\tpass\n\
try:\n\
\tfree = gc.mem_free()\n\
except Exception:\n\
\tfree = None\n\
print(json.dumps({'platform': sys.platform, 'version': sys.version, 'free_memory': free, 'features': features}))";

struct Inner<T: Transport> {
    engine: Option<RawReplEngine<T>>,
    connection: ConnectionState,
    capability: Option<CapabilitySnapshot>,
    history: VecDeque<String>,
}

/// Owns exactly one logical connection to a MicroPython-family device.
pub struct Session<F: TransportFactory> {
    factory: F,
    config: SessionConfig,
    inner: Mutex<Inner<F::Transport>>,
    output_subs: Observer<OutputEvent>,
    state_subs: Observer<StateEvent>,
}

enum ExecuteOutcome {
    Completed(Result<Vec<u8>, ProtocolError>),
    Cancelled,
}

impl<F> Session<F>
where
    F: TransportFactory + 'static,
    F::Transport: 'static,
{
    pub fn new(factory: F, config: SessionConfig) -> Arc<Session<F>> {
        Arc::new(Session {
            factory,
            config,
            inner: Mutex::new(Inner {
                engine: None,
                connection: ConnectionState::Disconnected,
                capability: None,
                history: VecDeque::new(),
            }),
            output_subs: Observer::new(),
            state_subs: Observer::new(),
        })
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.connection
    }

    pub async fn capability(&self) -> Option<CapabilitySnapshot> {
        self.inner.lock().await.capability.clone()
    }

    pub fn subscribe_output(&self, callback: impl Fn(&OutputEvent) + Send + Sync + 'static) -> SubscriptionHandle<OutputEvent> {
        self.output_subs.subscribe(callback)
    }

    pub fn subscribe_state(&self, callback: impl Fn(&StateEvent) + Send + Sync + 'static) -> SubscriptionHandle<StateEvent> {
        self.state_subs.subscribe(callback)
    }

    /// Idempotent: `Disconnected→Connecting→Connected` or `→Error`.
    pub async fn connect(self: &Arc<Self>) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().await;
        if guard.connection == ConnectionState::Connected {
            return Ok(());
        }
        let old = guard.connection;
        guard.connection = ConnectionState::Connecting;
        let connecting_event = StateEvent { old, new: ConnectionState::Connecting, reason: None, cause: None };

        let outcome = self.run_handshake().await;
        let result = match outcome {
            Ok((engine, capability)) => {
                guard.engine = Some(engine);
                guard.capability = capability;
                guard.connection = ConnectionState::Connected;
                Ok(())
            }
            Err(cause) => {
                guard.connection = ConnectionState::Error;
                Err(SessionError::ConnectionFailed {
                    cause: cause.clone(),
                    context: ErrorContext::new("CONNECTION_FAILED", "mpy-session").with_field("cause", &cause),
                })
            }
        };
        let final_state = guard.connection;
        drop(guard);

        self.state_subs.emit(&connecting_event);
        self.state_subs.emit(&StateEvent {
            old: ConnectionState::Connecting,
            new: final_state,
            reason: None,
            cause: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    /// Best-effort exit from `Raw`, close transport, `→Disconnected`.
    pub async fn disconnect(self: &Arc<Self>) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().await;
        let old = guard.connection;
        if old == ConnectionState::Disconnected {
            return Ok(());
        }
        if let Some(mut engine) = guard.engine.take() {
            let _ = engine.exit_raw(self.config.timeouts.execute).await;
            let mut transport = engine.into_transport();
            let _ = transport.close().await;
        }
        guard.connection = ConnectionState::Disconnected;
        guard.capability = None;
        drop(guard);
        self.state_subs.emit(&StateEvent { old, new: ConnectionState::Disconnected, reason: None, cause: None });
        Ok(())
    }

    /// Validate, serialize, execute one fragment, and return its parsed result.
    pub async fn execute(self: &Arc<Self>, code: &str, cancel: Option<CancelSignal>) -> Result<ResultRecord, SessionError> {
        self.execute_with_timeout(code, cancel, None).await
    }

    /// As [`Session::execute`], but `timeout` overrides `config.timeouts.execute`
    /// for this call only (spec.md §4.6: "each operation uses its own `timeout_ms`
    /// or the Orchestrator default").
    pub async fn execute_with_timeout(
        self: &Arc<Self>,
        code: &str,
        cancel: Option<CancelSignal>,
        timeout_override: Option<Duration>,
    ) -> Result<ResultRecord, SessionError> {
        let cancel = cancel.unwrap_or_default();

        let report = validate(code, &self.config.validator);
        if !report.ok {
            return Err(SessionError::Validation {
                reason: report.reason.unwrap_or_default(),
                concerns: report.concerns,
                context: ErrorContext::new("VALIDATION_REJECTED", "mpy-validator").with_fragment(code),
            });
        }

        if self.state().await == ConnectionState::Disconnected {
            self.connect().await?;
        }

        let mut guard = tokio::select! {
            g = self.inner.lock() => g,
            _ = cancel.cancelled() => return Err(SessionError::Cancelled(ErrorContext::new("CANCELLED", "mpy-session").with_fragment(code))),
        };

        if guard.connection == ConnectionState::Error {
            return Err(SessionError::ReconnectExhausted {
                attempts: self.config.reconnect.max_attempts,
                context: ErrorContext::new("RECONNECT_EXHAUSTED", "mpy-session"),
            });
        }
        if guard.connection != ConnectionState::Connected {
            return Err(SessionError::ConnectionFailed {
                cause: "session is not connected".to_string(),
                context: ErrorContext::new("NOT_CONNECTED", "mpy-session"),
            });
        }

        let old = guard.connection;
        guard.connection = ConnectionState::Executing;
        let executing_event = StateEvent { old, new: ConnectionState::Executing, reason: None, cause: None };

        let wrapped = wrap_if_expression(code);
        let supports_raw_paste = guard.capability.as_ref().map(|c| c.supports_raw_paste).unwrap_or(true);
        let timeout = timeout_override.unwrap_or(self.config.timeouts.execute);
        let deadline = deadline_in(timeout);

        let engine = match guard.engine.as_mut() {
            Some(e) => e,
            None => {
                return Err(SessionError::ConnectionFailed {
                    cause: "no active transport".to_string(),
                    context: ErrorContext::new("NO_TRANSPORT", "mpy-session"),
                })
            }
        };

        let body = async {
            engine.enter_raw(timeout).await?;
            let payload = if supports_raw_paste {
                match engine.execute_raw_paste(wrapped.as_bytes(), timeout, deadline).await? {
                    RawPasteOutcome::Executed(out) => out.payload,
                    RawPasteOutcome::Unsupported => engine.execute_raw(wrapped.as_bytes(), timeout, deadline).await?.payload,
                }
            } else {
                engine.execute_raw(wrapped.as_bytes(), timeout, deadline).await?.payload
            };
            engine.exit_raw(timeout).await?;
            Ok::<Vec<u8>, ProtocolError>(payload)
        };

        let outcome = tokio::select! {
            res = body => ExecuteOutcome::Completed(res),
            _ = cancel.cancelled() => ExecuteOutcome::Cancelled,
        };

        match outcome {
            ExecuteOutcome::Cancelled => {
                let settle = Duration::from_millis(200);
                let _ = engine.interrupt(settle).await;
                let _ = engine.exit_raw(settle).await;
                guard.connection = ConnectionState::Connected;
                let done = StateEvent {
                    old: ConnectionState::Executing,
                    new: ConnectionState::Connected,
                    reason: Some("cancelled".to_string()),
                    cause: None,
                };
                drop(guard);
                self.state_subs.emit(&executing_event);
                self.state_subs.emit(&done);
                Err(SessionError::Cancelled(ErrorContext::new("CANCELLED", "mpy-session").with_fragment(code)))
            }
            ExecuteOutcome::Completed(Err(e)) => {
                Err(self.fail_and_reconnect(guard, ConnectionState::Executing, e, vec![executing_event]).await)
            }
            ExecuteOutcome::Completed(Ok(payload)) => {
                let record = ResultRecord::from_framed_payload(&payload);
                if record.success {
                    guard.history.push_back(code.to_string());
                    while guard.history.len() > self.config.history_capacity {
                        guard.history.pop_front();
                    }
                }
                guard.connection = ConnectionState::Connected;
                let done_event = StateEvent { old: ConnectionState::Executing, new: ConnectionState::Connected, reason: None, cause: None };
                let output_event = OutputEvent {
                    text: if record.success { record.stdout.clone() } else { record.stderr.clone() },
                    is_error: !record.success,
                    timestamp: SystemTime::now(),
                };
                drop(guard);

                self.state_subs.emit(&executing_event);
                self.state_subs.emit(&done_event);
                self.output_subs.emit(&output_event);

                if record.success {
                    Ok(record)
                } else {
                    let context = ErrorContext::new("DEVICE_ERROR", "mpy-parser")
                        .with_fragment(code)
                        .with_field("line_number", record.line_number.map(|n| n.to_string()).unwrap_or_default());
                    Err(SessionError::from_device_error(record.error_kind, record.stderr.clone(), record.line_number, context))
                }
            }
        }
    }

    /// `execute`, then convert the result's value via `mpy-convert`.
    pub async fn execute_typed<T: ConvertText>(self: &Arc<Self>, code: &str, cancel: Option<CancelSignal>) -> Result<T, SessionError> {
        let record = self.execute(code, cancel).await?;
        convert::<T>(&record.value)
            .map_err(|e| SessionError::ConversionFailed(e, ErrorContext::new("CONVERSION_FAILED", "mpy-convert").with_fragment(code)))
    }

    pub async fn put_file(self: &Arc<Self>, remote_path: &str, bytes: &[u8]) -> Result<(), SessionError> {
        let fragment = file_transfer::put_fragment(remote_path, bytes);
        self.execute(&fragment, None).await?;
        Ok(())
    }

    pub async fn get_file(self: &Arc<Self>, remote_path: &str) -> Result<Vec<u8>, SessionError> {
        let fragment = file_transfer::get_fragment(remote_path);
        let record = self.execute(&fragment, None).await?;
        if record.value.trim() == FILE_NOT_FOUND_SENTINEL {
            return Err(SessionError::FileNotFound {
                remote_path: remote_path.to_string(),
                context: ErrorContext::new("FILE_NOT_FOUND", "mpy-session").with_field("remote_path", remote_path),
            });
        }
        file_transfer::decode_get_result(&record.value).map_err(|e| {
            SessionError::ConversionFailed(
                mpy_convert::ConversionFailed { text: record.value.clone(), target_type: "bytes", cause: e.to_string() },
                ErrorContext::new("FILE_DECODE_FAILED", "mpy-session").with_field("remote_path", remote_path),
            )
        })
    }

    async fn run_handshake(&self) -> Result<(RawReplEngine<F::Transport>, Option<CapabilitySnapshot>), String> {
        let transport = self.factory.open().await.map_err(|e| e.to_string())?;
        let mut engine = RawReplEngine::new(transport);
        engine.transport_mut().open().await.map_err(|e| e.to_string())?;

        engine.transport_mut().write_all(&[ETX], deadline_in(self.config.timeouts.execute)).await.map_err(|e| e.to_string())?;
        tokio::time::sleep(self.config.timeouts.post_interrupt_settle).await;
        engine.transport_mut().write_all(&[EOT], deadline_in(self.config.timeouts.execute)).await.map_err(|e| e.to_string())?;
        tokio::time::sleep(self.config.timeouts.post_soft_reboot_settle).await;

        engine.init(Duration::ZERO, self.config.timeouts.engine_init).await.map_err(|e| e.to_string())?;

        let capability = if self.config.probe_capabilities_on_connect {
            match self.probe_capabilities(&mut engine).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    debug!(error = %e, "capability probe failed, continuing without a snapshot");
                    None
                }
            }
        } else {
            None
        };

        Ok((engine, capability))
    }

    async fn probe_capabilities(&self, engine: &mut RawReplEngine<F::Transport>) -> Result<CapabilitySnapshot, ProtocolError> {
        let timeout = self.config.timeouts.capability_probe;
        let deadline = deadline_in(timeout);
        engine.enter_raw(timeout).await?;

        let probe_result = async {
            match engine.execute_raw_paste(PROBE_FRAGMENT.as_bytes(), timeout, deadline).await? {
                RawPasteOutcome::Executed(out) => Ok((out.payload, true)),
                RawPasteOutcome::Unsupported => {
                    let out = engine.execute_raw(PROBE_FRAGMENT.as_bytes(), timeout, deadline).await?;
                    Ok((out.payload, false))
                }
            }
        }
        .await;

        let (payload, supports_raw_paste) = match probe_result {
            Ok(p) => p,
            Err(e) => {
                let _ = engine.exit_raw(timeout).await;
                return Err(e);
            }
        };
        let _ = engine.exit_raw(timeout).await;

        let record = ResultRecord::from_framed_payload(&payload);
        if !record.success {
            return Err(ProtocolError::ProtocolMismatch { expected: ProtocolState::Raw, actual: engine.state() });
        }
        let probe: ProbeResponse = serde_json::from_str(record.value.trim())
            .map_err(|_| ProtocolError::ProtocolMismatch { expected: ProtocolState::Raw, actual: engine.state() })?;
        Ok(CapabilitySnapshot::from_probe(probe, supports_raw_paste))
    }

    async fn fail_and_reconnect(
        self: &Arc<Self>,
        mut guard: MutexGuard<'_, Inner<F::Transport>>,
        old: ConnectionState,
        err: ProtocolError,
        mut pending: Vec<StateEvent>,
    ) -> SessionError {
        let context = ErrorContext::new("TRANSPORT_FAILURE", "mpy-protocol").with_field("detail", err.to_string());
        guard.connection = ConnectionState::Reconnecting;
        pending.push(StateEvent {
            old,
            new: ConnectionState::Reconnecting,
            reason: Some("transport failure".to_string()),
            cause: Some(err.to_string()),
        });
        if let Some(engine) = guard.engine.take() {
            let mut transport = engine.into_transport();
            let _ = transport.close().await;
        }
        drop(guard);
        for event in &pending {
            self.state_subs.emit(event);
        }
        self.spawn_reconnect();
        session_error_from_protocol(err, context)
    }

    /// Re-submit one historical fragment after a reconnect (spec.md §5
    /// ordering guarantee 3, §9: "replay … should not itself recurse into
    /// reconnection"). Runs the same raw/raw-paste send `execute` would have
    /// taken but never re-appends `code` to `history` — replaying must not
    /// grow the buffer on every reconnect — and never calls
    /// `fail_and_reconnect` on a transport error: the caller is already
    /// inside `reconnect_loop` and decides what to do next, rather than a
    /// second loop spawning alongside it.
    async fn replay_fragment(self: &Arc<Self>, code: &str) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().await;
        if guard.connection != ConnectionState::Connected {
            return Err(SessionError::ConnectionFailed {
                cause: "session is not connected".to_string(),
                context: ErrorContext::new("NOT_CONNECTED", "mpy-session"),
            });
        }

        let wrapped = wrap_if_expression(code);
        let supports_raw_paste = guard.capability.as_ref().map(|c| c.supports_raw_paste).unwrap_or(true);
        let timeout = self.config.timeouts.execute;
        let deadline = deadline_in(timeout);

        let engine = match guard.engine.as_mut() {
            Some(e) => e,
            None => {
                return Err(SessionError::ConnectionFailed {
                    cause: "no active transport".to_string(),
                    context: ErrorContext::new("NO_TRANSPORT", "mpy-session"),
                })
            }
        };

        let result: Result<Vec<u8>, ProtocolError> = async {
            engine.enter_raw(timeout).await?;
            let payload = if supports_raw_paste {
                match engine.execute_raw_paste(wrapped.as_bytes(), timeout, deadline).await? {
                    RawPasteOutcome::Executed(out) => out.payload,
                    RawPasteOutcome::Unsupported => engine.execute_raw(wrapped.as_bytes(), timeout, deadline).await?.payload,
                }
            } else {
                engine.execute_raw(wrapped.as_bytes(), timeout, deadline).await?.payload
            };
            engine.exit_raw(timeout).await?;
            Ok(payload)
        }
        .await;

        match result {
            Ok(_payload) => Ok(()),
            Err(e) => {
                let context = ErrorContext::new("TRANSPORT_FAILURE", "mpy-protocol").with_field("detail", e.to_string());
                Err(session_error_from_protocol(e, context))
            }
        }
    }

    fn spawn_reconnect(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.reconnect_loop().await });
    }

    async fn reconnect_loop(self: Arc<Self>) {
        if !self.config.reconnect.enabled {
            self.inner.lock().await.connection = ConnectionState::Error;
            return;
        }

        for attempt in 1..=self.config.reconnect.max_attempts {
            tokio::time::sleep(self.config.reconnect.delay_for_attempt(attempt)).await;
            match self.run_handshake().await {
                Ok((engine, capability)) => {
                    let history_snapshot: Vec<String> = {
                        let mut guard = self.inner.lock().await;
                        guard.engine = Some(engine);
                        guard.capability = capability;
                        guard.connection = ConnectionState::Connected;
                        guard.history.iter().cloned().collect()
                    };
                    self.state_subs.emit(&StateEvent {
                        old: ConnectionState::Reconnecting,
                        new: ConnectionState::Connected,
                        reason: Some(format!("reconnected after {attempt} attempt(s)")),
                        cause: None,
                    });
                    for fragment in history_snapshot {
                        if let Err(e) = self.replay_fragment(&fragment).await {
                            warn!(error = %e, fragment = %fragment, "history replay entry failed, continuing");
                        }
                    }
                    return;
                }
                Err(cause) => {
                    debug!(attempt, error = %cause, "reconnect attempt failed");
                }
            }
        }

        self.inner.lock().await.connection = ConnectionState::Error;
        self.state_subs.emit(&StateEvent {
            old: ConnectionState::Reconnecting,
            new: ConnectionState::Error,
            reason: Some("reconnect attempts exhausted".to_string()),
            cause: None,
        });
    }
}

fn session_error_from_protocol(e: ProtocolError, ctx: ErrorContext) -> SessionError {
    match e {
        ProtocolError::Transport(te) => SessionError::TransportFailed(te, ctx),
        ProtocolError::Timeout => SessionError::Timeout(ctx),
        ProtocolError::TransportAbort => SessionError::TransportFailed(mpy_transport::TransportError::TransportFailed, ctx),
        other @ ProtocolError::ProtocolMismatch { .. } => SessionError::ProtocolMismatch(other, ctx),
        ProtocolError::FlowControlViolation { .. } => SessionError::FlowControlViolation(ctx),
    }
}
