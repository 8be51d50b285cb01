//! A `SessionConfig` tuned for fast, deterministic tests: the settle sleeps
//! baked into the real handshake (spec.md §4.5) are real devices' grace
//! periods, not useful delay in-process against an `mpy-emulator` device.

use mpy_session::{ReconnectPolicy, SessionConfig, TimeoutProfile};
use mpy_validator::ValidatorPolicy;
use std::time::Duration;

pub fn fast_session_config() -> SessionConfig {
    SessionConfig {
        reconnect: ReconnectPolicy {
            enabled: true,
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            exponential: false,
            max_delay_cap: Duration::from_millis(10),
        },
        timeouts: TimeoutProfile {
            post_interrupt_settle: Duration::from_millis(1),
            post_soft_reboot_settle: Duration::from_millis(1),
            engine_init: Duration::from_secs(2),
            execute: Duration::from_secs(2),
            capability_probe: Duration::from_secs(2),
        },
        validator: ValidatorPolicy::development(),
        probe_capabilities_on_connect: false,
        ..SessionConfig::default()
    }
}
