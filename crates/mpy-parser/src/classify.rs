//! Error taxonomy and classification (spec.md §3, §4.3, §7).

/// Fixed error taxonomy. `None` is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    None,
    Syntax,
    Runtime,
    Memory,
    FileSystem,
    Import,
    Interrupted,
    Timeout,
    Transport,
    Unknown,
}

impl ErrorKind {
    /// Memory and FileSystem failures default to non-recoverable; everything
    /// else (including `None`) is treated as recoverable.
    pub fn recoverable(self) -> bool {
        !matches!(self, ErrorKind::Memory | ErrorKind::FileSystem)
    }
}

struct Trigger {
    kind: ErrorKind,
    substrings: &'static [&'static str],
    case_insensitive: bool,
}

const TAXONOMY: &[Trigger] = &[
    Trigger { kind: ErrorKind::Syntax, substrings: &["SyntaxError", "IndentationError", "TabError"], case_insensitive: false },
    Trigger { kind: ErrorKind::Memory, substrings: &["MemoryError", "out of memory", "Cannot allocate"], case_insensitive: false },
    Trigger { kind: ErrorKind::FileSystem, substrings: &["FileNotFoundError", "PermissionError", "ENOENT", "EACCES", "ENOSPC"], case_insensitive: false },
    Trigger { kind: ErrorKind::Import, substrings: &["ImportError", "ModuleNotFoundError"], case_insensitive: false },
    Trigger { kind: ErrorKind::Interrupted, substrings: &["KeyboardInterrupt", "SystemExit", "Operation cancelled"], case_insensitive: false },
    Trigger { kind: ErrorKind::Timeout, substrings: &["timeout", "timed out", "TIMEOUT"], case_insensitive: true },
    Trigger {
        kind: ErrorKind::Runtime,
        substrings: &[
            "NameError", "TypeError", "ValueError", "AttributeError", "KeyError",
            "IndexError", "ZeroDivisionError", "RuntimeError", "OSError",
        ],
        case_insensitive: false,
    },
];

/// Substrings that mark a line as a recognized exception report, used by the
/// `Traceback` false-positive guard.
fn is_recognized_exception_line(line: &str) -> bool {
    TAXONOMY.iter().any(|t| trigger_matches(t, line)) || line.contains("Traceback") || line.contains("Error")
}

fn trigger_matches(trigger: &Trigger, text: &str) -> bool {
    if trigger.case_insensitive {
        let lower = text.to_lowercase();
        trigger.substrings.iter().any(|s| lower.contains(&s.to_lowercase()))
    } else {
        trigger.substrings.iter().any(|s| text.contains(s))
    }
}

/// Classify an error region directly against the taxonomy.
///
/// `OSError` only counts toward `Runtime` when no filesystem substring is
/// also present, per the priority table — `FileSystem` is checked first, so
/// by the time `Runtime`'s `OSError` trigger is reached the filesystem case
/// has already been ruled out.
pub fn classify_error_region(error_region: &str) -> ErrorKind {
    if error_region.trim().is_empty() {
        return ErrorKind::None;
    }
    for trigger in TAXONOMY {
        if trigger_matches(trigger, error_region) {
            return trigger.kind;
        }
    }
    if error_region.contains("Traceback") || error_region.contains("Error") {
        return ErrorKind::Unknown;
    }
    ErrorKind::None
}

/// Classify a framed response, applying the `Traceback` false-positive guard
/// when the error region is empty but the output region contains stray
/// traceback-shaped text (e.g. a subprocess's unframed stderr was folded
/// into stdout).
pub fn classify_with_output_guard(output_region: &str, error_region: &str) -> ErrorKind {
    let direct = classify_error_region(error_region);
    if direct != ErrorKind::None {
        return direct;
    }
    if !output_region.contains("Traceback") {
        return ErrorKind::None;
    }
    let mut lines = output_region.lines();
    let found_traceback = lines.by_ref().any(|l| l.contains("Traceback"));
    if !found_traceback {
        return ErrorKind::None;
    }
    for line in lines {
        if is_recognized_exception_line(line) {
            return classify_error_region(line);
        }
    }
    ErrorKind::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_priority() {
        assert_eq!(classify_error_region("Traceback...\nSyntaxError: invalid syntax"), ErrorKind::Syntax);
        assert_eq!(classify_error_region("MemoryError"), ErrorKind::Memory);
        assert_eq!(classify_error_region("OSError: [Errno 2] ENOENT"), ErrorKind::FileSystem);
        assert_eq!(classify_error_region("OSError: something else"), ErrorKind::Runtime);
        assert_eq!(classify_error_region("NameError: name 'x' is not defined"), ErrorKind::Runtime);
        assert_eq!(classify_error_region("Connection TIMEOUT"), ErrorKind::Timeout);
    }

    #[test]
    fn empty_region_is_success() {
        assert_eq!(classify_error_region(""), ErrorKind::None);
        assert_eq!(classify_error_region("   \r\n"), ErrorKind::None);
    }

    #[test]
    fn unrecognized_traceback_falls_back_to_unknown() {
        assert_eq!(classify_error_region("Traceback (most recent call last):\nWeirdError: nope"), ErrorKind::Unknown);
    }

    #[test]
    fn traceback_in_output_region_alone_is_not_an_error() {
        assert_eq!(classify_with_output_guard("Traceback", ""), ErrorKind::None);
    }

    #[test]
    fn traceback_followed_by_recognized_exception_in_output_is_flagged() {
        let out = "Traceback (most recent call last):\n  File \"<stdin>\", line 1\nNameError: name 'x' is not defined";
        assert_eq!(classify_with_output_guard(out, ""), ErrorKind::Runtime);
    }

    #[test]
    fn non_empty_error_region_wins_over_output_guard() {
        assert_eq!(classify_with_output_guard("Traceback", "SyntaxError: bad"), ErrorKind::Syntax);
    }
}
