//! Validator policy and risk levels (spec.md §4.4).

/// Relative severity of a validation concern or rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Configurable strictness for [`crate::validate`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatorPolicy {
    /// Strict policies additionally reject `compile(`.
    pub strict: bool,
    pub allow_file_operations: bool,
    pub allow_networking: bool,
    pub max_code_length: usize,
    pub max_bracket_depth: usize,
    /// Substrings that, if present, skip the matching built-in block rule.
    pub allow_list: Vec<String>,
    /// Caller-supplied substrings that unconditionally reject, regardless of
    /// `allow_list`.
    pub block_list: Vec<String>,
}

impl ValidatorPolicy {
    /// Relaxed policy for interactive development: file and network access
    /// allowed, only the hard-coded dangerous substrings are rejected.
    pub fn development() -> ValidatorPolicy {
        ValidatorPolicy {
            strict: false,
            allow_file_operations: true,
            allow_networking: true,
            max_code_length: 50_000,
            max_bracket_depth: 25,
            allow_list: Vec::new(),
            block_list: Vec::new(),
        }
    }

    /// Strict policy for unattended/production execution: neither file nor
    /// network access, `compile(` also rejected.
    pub fn production() -> ValidatorPolicy {
        ValidatorPolicy {
            strict: true,
            allow_file_operations: false,
            allow_networking: false,
            max_code_length: 50_000,
            max_bracket_depth: 25,
            allow_list: Vec::new(),
            block_list: Vec::new(),
        }
    }

    /// Maximal lockdown used only for attestation tests: rejects essentially
    /// all non-trivial code by block-listing the statement keywords a real
    /// workload would need.
    pub fn maximum() -> ValidatorPolicy {
        ValidatorPolicy {
            strict: true,
            allow_file_operations: false,
            allow_networking: false,
            max_code_length: 200,
            max_bracket_depth: 4,
            allow_list: Vec::new(),
            block_list: vec![
                "def ".to_string(),
                "class ".to_string(),
                "lambda".to_string(),
                "import ".to_string(),
                "for ".to_string(),
                "while ".to_string(),
                "try".to_string(),
                "with ".to_string(),
            ],
        }
    }
}
