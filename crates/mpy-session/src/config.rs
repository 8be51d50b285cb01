//! Construction-time configuration (spec.md §3, §5). No file/TOML loading
//! here by design — the host application owns config loading, this crate
//! only defines the shapes.

use mpy_validator::ValidatorPolicy;
use std::time::Duration;

/// Reconnection policy (spec.md §3). Immutable once a [`Session`](crate::Session)
/// is constructed.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub exponential: bool,
    pub max_delay_cap: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: true,
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            exponential: true,
            max_delay_cap: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// `delay(k) = min(base * 2^(k-1), cap)` when exponential, else `base`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay.min(self.max_delay_cap);
        }
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay_cap)
    }
}

/// Explicit deadlines for each phase of the connect handshake and execute
/// call. Spec.md §5: "all timeouts are explicit deadlines, never interval
/// sleeps interrupted by polling".
#[derive(Debug, Clone)]
pub struct TimeoutProfile {
    pub post_interrupt_settle: Duration,
    pub post_soft_reboot_settle: Duration,
    pub engine_init: Duration,
    pub execute: Duration,
    pub capability_probe: Duration,
}

impl Default for TimeoutProfile {
    fn default() -> TimeoutProfile {
        TimeoutProfile {
            post_interrupt_settle: Duration::from_millis(100),
            post_soft_reboot_settle: Duration::from_millis(500),
            engine_init: Duration::from_secs(5),
            execute: Duration::from_secs(30),
            capability_probe: Duration::from_secs(5),
        }
    }
}

/// Top-level, immutable session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub reconnect: ReconnectPolicy,
    pub timeouts: TimeoutProfile,
    pub validator: ValidatorPolicy,
    pub history_capacity: usize,
    pub probe_capabilities_on_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            reconnect: ReconnectPolicy::default(),
            timeouts: TimeoutProfile::default(),
            validator: ValidatorPolicy::development(),
            history_capacity: 1000,
            probe_capabilities_on_connect: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_caps_at_max_delay() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(30));
    }

    #[test]
    fn non_exponential_policy_always_uses_base_delay() {
        let policy = ReconnectPolicy { exponential: false, ..ReconnectPolicy::default() };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(1));
    }
}
