//! One-byte control characters used by the Raw / Raw-Paste wire protocol.

/// Enter Raw mode.
pub const SOH: u8 = 0x01;
/// Exit Raw mode.
pub const STX: u8 = 0x02;
/// Interrupt a running program.
pub const ETX: u8 = 0x03;
/// End-of-data / execute.
pub const EOT: u8 = 0x04;
/// Raw-paste handshake prefix.
pub const ENQ: u8 = 0x05;

/// The three-byte framing terminator closing every execute response.
pub const TERMINATOR: [u8; 3] = [EOT, EOT, b'>'];
