//! End-to-end Raw/Raw-Paste REPL scenarios (spec.md §8), driven against
//! `mpy-emulator`'s `FakeDevice` instead of real hardware: bare-expression
//! eval, multi-statement blocks, device runtime errors, the `Traceback`
//! false-positive guard, raw-paste-unsupported fallback, and reconnect with
//! history replay.

use mpy_parser::ErrorKind;
use mpy_session::{ConnectionState, Session, SessionConfig, SessionError};
use mpy_test_utils::{fast_session_config, DuplexFactory, StateRecorder};
use std::sync::Arc;
use std::time::Duration;

/// Poll `session.state()` until it settles to `target`, bounded by a
/// generous wall-clock timeout so a wedged reconnect fails the test instead
/// of hanging the suite.
async fn wait_for_state<F>(session: &Arc<Session<F>>, target: ConnectionState)
where
    F: mpy_session::TransportFactory + 'static,
    F::Transport: 'static,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if session.state().await == target {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for connection state");
}

#[tokio::test]
async fn bare_expression_eval_returns_value_with_no_error_transitions() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();
    let recorder = StateRecorder::attach(&session);

    let record = session.execute("1+1", None).await.unwrap();
    assert!(record.success);
    assert_eq!(record.value, "2");
    assert_eq!(record.error_kind, ErrorKind::None);

    let typed: i64 = session.execute_typed("1+1", None).await.unwrap();
    assert_eq!(typed, 2);

    assert!(!recorder.states().contains(&ConnectionState::Error));
    assert_eq!(session.state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn multi_statement_block_executes_in_order_and_grows_history() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let record = session.execute("x=7\ny=6\nprint(x*y)", None).await.unwrap();
    assert!(record.success);
    assert_eq!(record.value, "42");
}

#[tokio::test]
async fn device_runtime_error_reports_line_number_and_keeps_session_connected() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let err = session.execute("x", None).await.unwrap_err();
    match err {
        SessionError::DeviceRuntime { message, line_number, .. } => {
            assert!(message.contains("NameError"));
            assert_eq!(line_number, Some(1));
        }
        other => panic!("expected DeviceRuntime, got {other:?}"),
    }
    assert_eq!(session.state().await, ConnectionState::Connected);
}

#[tokio::test]
async fn literal_traceback_text_is_not_mistaken_for_a_device_error() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let record = session.execute("print('Traceback')", None).await.unwrap();
    assert!(record.success);
    assert_eq!(record.value, "Traceback");
}

#[tokio::test]
async fn raw_paste_unsupported_device_falls_back_to_plain_raw() {
    let factory = DuplexFactory::new(false);
    let config = SessionConfig { probe_capabilities_on_connect: true, ..fast_session_config() };
    let session = Session::new(factory, config);
    session.connect().await.unwrap();

    let capability = session.capability().await.expect("capability probe should have run");
    assert_eq!(capability.supports_raw_paste, false);

    let record = session.execute("42", None).await.unwrap();
    assert!(record.success);
    assert_eq!(record.value, "42");
}

#[tokio::test]
async fn transport_failure_triggers_reconnect_and_replays_history() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(Arc::clone(&factory), fast_session_config());
    session.connect().await.unwrap();
    let recorder = StateRecorder::attach(&session);

    session.execute("a=1", None).await.unwrap();
    session.execute("b=2", None).await.unwrap();

    factory.sever_current().await;
    let broken = session.execute("c=3", None).await;
    assert!(broken.is_err());

    wait_for_state(&session, ConnectionState::Connected).await;
    assert!(recorder.states().contains(&ConnectionState::Reconnecting));

    // The fresh device only has `a` and `b` replayed against it; `c=3` failed
    // before the break and is not in history.
    let record = session.execute("a+b", None).await.unwrap();
    assert_eq!(record.value, "3");
}
