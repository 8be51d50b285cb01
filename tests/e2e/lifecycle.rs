//! `LifecycleCoordinator` end-to-end against `mpy-emulator` (spec.md §4.6,
//! §7): setup ordering and critical/non-critical abort semantics, task
//! invocation, thread bookkeeping, and teardown's "first critical error
//! raised, everything else runs best-effort" rule.

use mpy_lifecycle::{LifecycleCoordinator, LifecycleDeclaration, LifecycleError, SetupOp, TaskOp, TeardownOp, ThreadOp};
use mpy_session::Session;
use mpy_test_utils::{fast_session_config, DuplexFactory};

fn setup_op(name: &str, order: i32, fragment: &str, critical: bool) -> SetupOp {
    SetupOp { name: name.to_string(), order, fragment: fragment.to_string(), critical, timeout: None }
}

fn teardown_op(name: &str, order: i32, fragment: &str, critical: bool, ignore_errors: bool) -> TeardownOp {
    TeardownOp { name: name.to_string(), order, fragment: fragment.to_string(), critical, ignore_errors, timeout: None }
}

#[tokio::test]
async fn setup_runs_by_order_not_declaration_sequence() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    // Declared as init, second, first — `order` must still win.
    let declaration = LifecycleDeclaration::new()
        .with_setup(setup_op("init", 0, "log = 0", true))
        .with_setup(setup_op("second", 5, "log = log*10 + 2", true))
        .with_setup(setup_op("first", 1, "log = log*10 + 1", true))
        .with_task(TaskOp { name: "read_log".to_string(), fragment: "print(log)".to_string(), exclusive: false, timeout: None });

    let coordinator = LifecycleCoordinator::new(session, declaration);
    coordinator.setup().await.unwrap();

    let record = coordinator.invoke_task("read_log", None).await.unwrap();
    assert_eq!(record.value, "12");
}

#[tokio::test]
async fn critical_setup_failure_aborts_remaining_setup() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let declaration = LifecycleDeclaration::new()
        .with_setup(setup_op("boom", 0, "undefined_name", true))
        .with_setup(setup_op("mark", 1, "marker = 1", true))
        .with_task(TaskOp { name: "read_marker".to_string(), fragment: "print(marker)".to_string(), exclusive: false, timeout: None });

    let coordinator = LifecycleCoordinator::new(session, declaration);
    let err = coordinator.setup().await.unwrap_err();
    assert!(matches!(err, LifecycleError::SetupFailed { name, .. } if name == "boom"));

    // "mark" never ran: `marker` is still undefined on the device.
    let err = coordinator.invoke_task("read_marker", None).await.unwrap_err();
    assert!(matches!(err, LifecycleError::TaskFailed { name, .. } if name == "read_marker"));
}

#[tokio::test]
async fn non_critical_setup_failure_is_logged_and_setup_continues() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let declaration = LifecycleDeclaration::new()
        .with_setup(setup_op("boom", 0, "undefined_name", false))
        .with_setup(setup_op("mark", 1, "marker = 1", true))
        .with_task(TaskOp { name: "read_marker".to_string(), fragment: "print(marker)".to_string(), exclusive: false, timeout: None });

    let coordinator = LifecycleCoordinator::new(session, declaration);
    coordinator.setup().await.unwrap();

    let record = coordinator.invoke_task("read_marker", None).await.unwrap();
    assert_eq!(record.value, "1");
}

#[tokio::test]
async fn task_invocation_rejects_unknown_names() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let declaration = LifecycleDeclaration::new().with_task(TaskOp {
        name: "double".to_string(),
        fragment: "x = 21\nprint(x*2)".to_string(),
        exclusive: false,
        timeout: None,
    });
    let coordinator = LifecycleCoordinator::new(session, declaration);

    let record = coordinator.invoke_task("double", None).await.unwrap();
    assert_eq!(record.value, "42");

    let err = coordinator.invoke_task("triple", None).await.unwrap_err();
    assert!(matches!(err, LifecycleError::UnknownTask { name } if name == "triple"));
}

#[tokio::test]
async fn thread_start_and_stop_track_running_threads() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let declaration = LifecycleDeclaration::new().with_thread(ThreadOp {
        name: "blinker".to_string(),
        start_fragment: "running = 1".to_string(),
        stop_fragment: "running = 0".to_string(),
        timeout: None,
    });
    let coordinator = LifecycleCoordinator::new(session, declaration);

    assert!(coordinator.running_threads().await.is_empty());

    coordinator.start_thread("blinker").await.unwrap();
    assert_eq!(coordinator.running_threads().await, vec!["blinker".to_string()]);

    coordinator.stop_thread("blinker").await.unwrap();
    assert!(coordinator.running_threads().await.is_empty());

    let err = coordinator.start_thread("fan").await.unwrap_err();
    assert!(matches!(err, LifecycleError::UnknownThread { name } if name == "fan"));
}

#[tokio::test]
async fn teardown_runs_every_op_best_effort_and_raises_the_first_critical_failure() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    // Execution order is descending `order`, reverse declaration order
    // within a tied bucket: a(10), then c(5, declared after b), then
    // b(5), then d(1).
    let declaration = LifecycleDeclaration::new()
        .with_teardown(teardown_op("a", 10, "print(1)", false, false))
        .with_teardown(teardown_op("b", 5, "bad_name_b", true, false))
        .with_teardown(teardown_op("c", 5, "bad_name_c", true, false))
        .with_teardown(teardown_op("d", 1, "bad_name_d", true, true));

    let coordinator = LifecycleCoordinator::new(session, declaration);
    let err = coordinator.teardown().await.unwrap_err();
    assert!(matches!(err, LifecycleError::TeardownFailed { name, .. } if name == "c"));
}

#[tokio::test]
async fn teardown_with_no_critical_failures_succeeds() {
    let factory = DuplexFactory::new(true);
    let session = Session::new(factory, fast_session_config());
    session.connect().await.unwrap();

    let declaration = LifecycleDeclaration::new()
        .with_teardown(teardown_op("a", 1, "print(1)", false, false))
        .with_teardown(teardown_op("b", 2, "bad_name_b", false, false));

    let coordinator = LifecycleCoordinator::new(session, declaration);
    coordinator.teardown().await.unwrap();
}
