//! Rule-by-rule rejection, mirroring the ordered-validation style of
//! `expand_target` in the forwarder's target-discovery module.

use crate::policy::{RiskLevel, ValidatorPolicy};

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub risk: RiskLevel,
    pub reason: Option<String>,
    pub concerns: Vec<String>,
}

const DANGEROUS_CRITICAL: &[&str] = &["exec(", "eval(", "__import__"];
const DANGEROUS_HIGH: &[&str] = &["os.system", "subprocess"];
const FILE_SUBSTRINGS: &[&str] = &["import os", "open(", "os.listdir", "os.remove"];
const NETWORK_SUBSTRINGS: &[&str] = &["import socket", "socket.", "network.", "import urequests"];

fn allowed(policy: &ValidatorPolicy, needle: &str) -> bool {
    policy.allow_list.iter().any(|a| a == needle)
}

/// Screen a code fragment against `policy`. Pure function: no I/O.
pub fn validate(code: &str, policy: &ValidatorPolicy) -> ValidationReport {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return reject(RiskLevel::Critical, "code is empty");
    }

    if code.len() > policy.max_code_length {
        return reject(RiskLevel::High, "code exceeds the configured length cap");
    }

    if let Some(c) = code.chars().find(|&c| (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r')) {
        return reject(RiskLevel::Critical, &format!("illegal control character {:#04x}", c as u32));
    }

    for blocked in &policy.block_list {
        if !blocked.is_empty() && code.contains(blocked.as_str()) {
            return reject(RiskLevel::Critical, &format!("code contains block-listed substring '{blocked}'"));
        }
    }

    for needle in DANGEROUS_CRITICAL {
        if code.contains(needle) && !allowed(policy, needle) {
            return reject(RiskLevel::Critical, &format!("code contains dangerous call '{needle}'"));
        }
    }

    for needle in DANGEROUS_HIGH {
        if code.contains(needle) && !allowed(policy, needle) {
            return reject(RiskLevel::High, &format!("code contains dangerous call '{needle}'"));
        }
    }

    if policy.strict && code.contains("compile(") && !allowed(policy, "compile(") {
        return reject(RiskLevel::High, "code contains 'compile(' under a strict policy");
    }

    if !policy.allow_file_operations {
        for needle in FILE_SUBSTRINGS {
            if code.contains(needle) && !allowed(policy, needle) {
                return reject(RiskLevel::High, &format!("file operations are disabled: found '{needle}'"));
            }
        }
    }

    if !policy.allow_networking {
        for needle in NETWORK_SUBSTRINGS {
            if code.contains(needle) && !allowed(policy, needle) {
                return reject(RiskLevel::High, &format!("networking is disabled: found '{needle}'"));
            }
        }
    }

    let mut concerns = Vec::new();
    let mut risk = RiskLevel::Low;
    let depth = max_bracket_depth(code);
    if depth >= policy.max_bracket_depth {
        concerns.push(format!("bracket nesting depth {depth} exceeds threshold {}", policy.max_bracket_depth));
        risk = RiskLevel::Medium;
    }

    ValidationReport { ok: true, risk, reason: None, concerns }
}

fn reject(risk: RiskLevel, reason: &str) -> ValidationReport {
    ValidationReport { ok: false, risk, reason: Some(reason.to_string()), concerns: Vec::new() }
}

fn max_bracket_depth(code: &str) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    for c in code.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_code() {
        let report = validate("   ", &ValidatorPolicy::development());
        assert!(!report.ok);
        assert_eq!(report.risk, RiskLevel::Critical);
    }

    #[test]
    fn rejects_oversized_code() {
        let policy = ValidatorPolicy { max_code_length: 4, ..ValidatorPolicy::development() };
        let report = validate("12345", &policy);
        assert!(!report.ok);
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn rejects_control_characters() {
        let report = validate("print(1)\x00", &ValidatorPolicy::development());
        assert!(!report.ok);
        assert_eq!(report.risk, RiskLevel::Critical);
    }

    #[test]
    fn allows_tabs_and_newlines() {
        let report = validate("if True:\n\tpass", &ValidatorPolicy::development());
        assert!(report.ok);
    }

    #[test]
    fn rejects_dangerous_calls() {
        assert!(!validate("eval('1+1')", &ValidatorPolicy::development()).ok);
        assert!(!validate("__import__('os')", &ValidatorPolicy::development()).ok);
        assert!(!validate("os.system('ls')", &ValidatorPolicy::development()).ok);
    }

    #[test]
    fn production_rejects_file_and_network_access() {
        let policy = ValidatorPolicy::production();
        assert!(!validate("import os", &policy).ok);
        assert!(!validate("open('f.txt')", &policy).ok);
        assert!(!validate("import socket", &policy).ok);
    }

    #[test]
    fn development_allows_file_and_network_access() {
        let policy = ValidatorPolicy::development();
        assert!(validate("import os", &policy).ok);
        assert!(validate("import socket", &policy).ok);
    }

    #[test]
    fn strict_rejects_compile() {
        assert!(!validate("compile('1', '<s>', 'eval')", &ValidatorPolicy::production()).ok);
        assert!(validate("compile('1', '<s>', 'eval')", &ValidatorPolicy::development()).ok);
    }

    #[test]
    fn allow_list_overrides_block_rule() {
        let policy = ValidatorPolicy {
            allow_list: vec!["os.system".to_string()],
            ..ValidatorPolicy::development()
        };
        assert!(validate("os.system('ls')", &policy).ok);
    }

    #[test]
    fn block_list_unconditionally_rejects() {
        let policy = ValidatorPolicy {
            block_list: vec!["machine.reset".to_string()],
            ..ValidatorPolicy::development()
        };
        let report = validate("machine.reset()", &policy);
        assert!(!report.ok);
        assert_eq!(report.risk, RiskLevel::Critical);
    }

    #[test]
    fn deep_bracket_nesting_is_flagged_not_rejected() {
        let nested = "(".repeat(30) + &")".repeat(30);
        let report = validate(&nested, &ValidatorPolicy::development());
        assert!(report.ok);
        assert_eq!(report.risk, RiskLevel::Medium);
        assert_eq!(report.concerns.len(), 1);
    }

    #[test]
    fn maximum_policy_rejects_ordinary_statements() {
        let policy = ValidatorPolicy::maximum();
        assert!(!validate("def f():\n    pass", &policy).ok);
        assert!(!validate("for i in range(3): pass", &policy).ok);
    }

    #[test]
    fn maximum_policy_allows_trivial_expressions() {
        let policy = ValidatorPolicy::maximum();
        assert!(validate("1+1", &policy).ok);
    }
}
