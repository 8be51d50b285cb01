//! Framed-payload splitting (spec.md §4.3).

const EOT: u8 = 0x04;

/// The two regions of a framed Raw/Raw-Paste response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedParts {
    pub output_region: String,
    pub error_region: String,
}

/// Split a framed payload at the first `EOT`.
///
/// `payload` is expected to already have the leading `OK` ack and the
/// trailing `EOT EOT '>'` terminator stripped by the protocol engine, but a
/// leading literal `"OK"` is stripped here too for callers that hand in a
/// payload captured before ack consumption. Both regions are trimmed of
/// CR/LF whitespace.
pub fn split_frame(payload: &[u8]) -> FramedParts {
    let payload = payload.strip_prefix(b"OK").unwrap_or(payload);
    let split_at = payload.iter().position(|&b| b == EOT);
    let (output, error) = match split_at {
        Some(idx) => (&payload[..idx], &payload[idx + 1..]),
        None => (payload, &payload[..0]),
    };
    FramedParts {
        output_region: trim_region(output),
        error_region: trim_region(error),
    }
}

fn trim_region(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_matches(|c: char| c == '\r' || c == '\n').to_string()
}
