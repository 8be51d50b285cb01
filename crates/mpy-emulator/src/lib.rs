//! An in-process fake MicroPython board, speaking Raw / Raw-Paste REPL over
//! a [`tokio::io::duplex`] pipe, used by integration tests that exercise
//! `mpy-session`/`mpy-lifecycle` end-to-end without real hardware.

mod device;
mod eval;
mod factory;

pub use device::FakeDevice;
pub use factory::DuplexFactory;
