//! Assembling a [`ResultRecord`] from a framed response (spec.md §3, §4.3).

use crate::classify::{classify_with_output_guard, ErrorKind};
use crate::frame::split_frame;

/// The outcome of one execute call.
///
/// Invariant: `success ⇒ stderr.is_empty() ∧ error_kind == ErrorKind::None`;
/// `!success ⇒ error_kind != ErrorKind::None`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResultRecord {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub value: String,
    pub error_kind: ErrorKind,
    pub line_number: Option<u32>,
}

impl ResultRecord {
    /// Parse a framed Raw/Raw-Paste payload (framing already stripped of its
    /// trailing terminator by the protocol engine) into a result record.
    pub fn from_framed_payload(payload: &[u8]) -> ResultRecord {
        let parts = split_frame(payload);
        let error_kind = classify_with_output_guard(&parts.output_region, &parts.error_region);
        let success = error_kind == ErrorKind::None;
        let line_number = if success { None } else { extract_line_number(&parts.error_region) };
        ResultRecord {
            success,
            stdout: parts.output_region.clone(),
            stderr: parts.error_region,
            value: parts.output_region,
            error_kind,
            line_number,
        }
    }
}

/// Locate the pattern `line <N>` and return the first match.
fn extract_line_number(text: &str) -> Option<u32> {
    let marker = "line ";
    let mut rest = text;
    while let Some(idx) = rest.find(marker) {
        let after = &rest[idx + marker.len()..];
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            if let Ok(n) = digits.parse() {
                return Some(n);
            }
            rest = &after[digits.len()..];
            continue;
        }
        // No digits right after the marker — advance past one full
        // character (which may be multi-byte) so the next `find` can't
        // re-match the same spot and can't land on a non-boundary index.
        rest = match after.chars().next() {
            Some(c) => &after[c.len_utf8()..],
            None => return None,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_call_has_no_error() {
        let record = ResultRecord::from_framed_payload(b"2\x04");
        assert!(record.success);
        assert_eq!(record.value, "2");
        assert_eq!(record.error_kind, ErrorKind::None);
        assert_eq!(record.line_number, None);
    }

    #[test]
    fn failed_call_extracts_line_number() {
        let payload = b"\x04Traceback (most recent call last):\n  File \"<stdin>\", line 1, in <module>\nNameError: name 'x' is not defined";
        let record = ResultRecord::from_framed_payload(payload);
        assert!(!record.success);
        assert_eq!(record.error_kind, ErrorKind::Runtime);
        assert_eq!(record.line_number, Some(1));
    }

    #[test]
    fn literal_traceback_in_stdout_is_not_an_error() {
        let record = ResultRecord::from_framed_payload(b"Traceback\x04");
        assert!(record.success);
        assert_eq!(record.value, "Traceback");
        assert_eq!(record.error_kind, ErrorKind::None);
    }

    #[test]
    fn line_marker_followed_by_multibyte_char_does_not_panic() {
        assert_eq!(extract_line_number("line →done"), None);
        assert_eq!(extract_line_number("line 1, in line →done"), Some(1));
    }
}
