//! Lifecycle Coordinator (spec.md §4.6): schedules Setup/Task/Thread/Teardown
//! operations declared ahead of time into ordered `execute` calls against a
//! `mpy_session::Session`.

mod coordinator;
mod declaration;
mod error;

pub use coordinator::LifecycleCoordinator;
pub use declaration::{LifecycleDeclaration, SetupOp, TaskOp, TeardownOp, ThreadOp};
pub use error::LifecycleError;
