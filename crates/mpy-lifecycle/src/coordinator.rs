//! The coordinator itself (spec.md §4.6): turns a [`LifecycleDeclaration`]
//! into ordered `execute` calls against one `mpy_session::Session`.

use crate::declaration::LifecycleDeclaration;
use crate::error::LifecycleError;
use mpy_parser::ResultRecord;
use mpy_session::{CancelSignal, Session, TransportFactory};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub struct LifecycleCoordinator<F: TransportFactory> {
    session: Arc<Session<F>>,
    declaration: LifecycleDeclaration,
    running_threads: Mutex<HashSet<String>>,
}

impl<F> LifecycleCoordinator<F>
where
    F: TransportFactory + 'static,
    F::Transport: 'static,
{
    pub fn new(session: Arc<Session<F>>, declaration: LifecycleDeclaration) -> LifecycleCoordinator<F> {
        LifecycleCoordinator { session, declaration, running_threads: Mutex::new(HashSet::new()) }
    }

    /// Run every Setup operation in `(order asc, declaration_index asc)`.
    /// A `critical` failure aborts the remaining setup; a non-critical
    /// failure is logged and skipped.
    pub async fn setup(&self) -> Result<(), LifecycleError> {
        for op in self.declaration.ordered_setup() {
            let result = self.session.execute_with_timeout(&op.fragment, None, op.timeout).await;
            if let Err(source) = result {
                if op.critical {
                    return Err(LifecycleError::SetupFailed { name: op.name.clone(), source });
                }
                warn!(name = %op.name, error = %source, "non-critical setup operation failed, continuing");
            }
        }
        Ok(())
    }

    /// Execute a declared Task by name. `exclusive` tasks carry no extra
    /// locking here: the session's single execution permit already forbids
    /// a nested `execute` for any caller, declared exclusive or not.
    pub async fn invoke_task(&self, name: &str, cancel: Option<CancelSignal>) -> Result<ResultRecord, LifecycleError> {
        let task = self
            .declaration
            .tasks
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| LifecycleError::UnknownTask { name: name.to_string() })?;
        self.session
            .execute_with_timeout(&task.fragment, cancel, task.timeout)
            .await
            .map_err(|source| LifecycleError::TaskFailed { name: name.to_string(), source })
    }

    /// Start a declared background thread on the device.
    pub async fn start_thread(&self, name: &str) -> Result<(), LifecycleError> {
        let thread = self
            .declaration
            .threads
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| LifecycleError::UnknownThread { name: name.to_string() })?;
        self.session
            .execute_with_timeout(&thread.start_fragment, None, thread.timeout)
            .await
            .map_err(|source| LifecycleError::ThreadStartFailed { name: name.to_string(), source })?;
        self.running_threads.lock().await.insert(name.to_string());
        Ok(())
    }

    /// Cooperatively request a declared background thread to stop.
    pub async fn stop_thread(&self, name: &str) -> Result<(), LifecycleError> {
        let thread = self
            .declaration
            .threads
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| LifecycleError::UnknownThread { name: name.to_string() })?;
        self.session
            .execute_with_timeout(&thread.stop_fragment, None, thread.timeout)
            .await
            .map_err(|source| LifecycleError::ThreadStopFailed { name: name.to_string(), source })?;
        self.running_threads.lock().await.remove(name);
        Ok(())
    }

    /// Logical names of threads this coordinator believes are still running.
    pub async fn running_threads(&self) -> Vec<String> {
        self.running_threads.lock().await.iter().cloned().collect()
    }

    /// Run every Teardown operation: buckets in descending `order`, reverse
    /// declaration order within a bucket. Runs every operation regardless of
    /// earlier failures — `critical` teardown still executes best-effort even
    /// once the session has moved to `Error`. Errors are collected as they
    /// happen; the first `critical` one is raised once every operation has
    /// run (spec.md §7: "the first critical one is raised at the end of
    /// teardown"). Non-critical failures are logged and otherwise dropped.
    pub async fn teardown(&self) -> Result<(), LifecycleError> {
        let mut first_critical = None;
        for op in self.declaration.ordered_teardown() {
            let result = self.session.execute_with_timeout(&op.fragment, None, op.timeout).await;
            if let Err(source) = result {
                if op.ignore_errors {
                    warn!(name = %op.name, error = %source, "ignoring teardown failure");
                    continue;
                }
                warn!(name = %op.name, error = %source, critical = op.critical, "teardown operation failed");
                if op.critical && first_critical.is_none() {
                    first_critical = Some(LifecycleError::TeardownFailed { name: op.name.clone(), source });
                }
            }
        }
        first_critical.map_or(Ok(()), Err)
    }
}
