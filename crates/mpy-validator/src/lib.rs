//! Input validator (spec.md §4.4).
//!
//! A pure function that screens a code fragment before it crosses the
//! transport. No I/O, no device knowledge — just pattern rules against a
//! configurable policy.

mod parameter;
mod policy;
mod rules;
mod sanitize;

pub use parameter::is_valid_parameter_name;
pub use policy::{RiskLevel, ValidatorPolicy};
pub use rules::{validate, ValidationReport};
pub use sanitize::sanitize_python_string;
