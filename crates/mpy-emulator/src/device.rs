//! An in-process fake MicroPython board: reads the device side of a
//! [`tokio::io::duplex`] pipe and speaks enough of the Raw / Raw-Paste REPL
//! protocol to drive the host-side `RawReplEngine` through a real exchange.
//!
//! Mirrors the byte sequences asserted in `mpy-protocol`'s own engine tests
//! (`crates/mpy-protocol/src/engine.rs`), just running continuously instead
//! of as a single scripted exchange.

use crate::eval;
use mpy_protocol::{ENQ, EOT, SOH, STX, TERMINATOR};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

const RAW_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";
const NORMAL_PROMPT: &[u8] = b">>>";
const RAW_PASTE_WINDOW: u16 = 1024;

/// A fake board bound to one connection's worth of duplex stream. Holds the
/// interpreter's persistent variables across however many execute cycles
/// happen on this connection; a fresh connection gets a fresh device and
/// therefore fresh variables.
pub struct FakeDevice {
    supports_raw_paste: bool,
}

impl FakeDevice {
    pub fn new(supports_raw_paste: bool) -> FakeDevice {
        FakeDevice { supports_raw_paste }
    }

    /// Drive `stream` until it closes or a read fails. Intended to be
    /// spawned as its own task per connection.
    pub async fn run(self, mut stream: DuplexStream) {
        let mut vars: HashMap<String, i64> = HashMap::new();
        loop {
            let byte = match read_byte(&mut stream).await {
                Ok(b) => b,
                Err(_) => return,
            };
            let result = match byte {
                SOH => stream.write_all(RAW_BANNER).await,
                STX => stream.write_all(NORMAL_PROMPT).await,
                ENQ => self.handle_raw_paste_probe(&mut stream, &mut vars).await,
                EOT | b'\r' => Ok(()),
                first => self.handle_plain_raw(&mut stream, first, &mut vars).await,
            };
            if result.is_err() {
                return;
            }
        }
    }

    async fn handle_raw_paste_probe(
        &self,
        stream: &mut DuplexStream,
        vars: &mut HashMap<String, i64>,
    ) -> std::io::Result<()> {
        let mut rest = [0u8; 2];
        stream.read_exact(&mut rest).await?;
        debug_assert_eq!(rest, [b'A', SOH]);

        if !self.supports_raw_paste {
            return stream.write_all(&[b'x']).await;
        }

        let window = RAW_PASTE_WINDOW.to_le_bytes();
        stream.write_all(&[b'R', 0x01, window[0], window[1]]).await?;
        let code = read_until_eot(stream).await?;
        let response = build_response(&code, vars);
        stream.write_all(&response).await
    }

    async fn handle_plain_raw(
        &self,
        stream: &mut DuplexStream,
        first: u8,
        vars: &mut HashMap<String, i64>,
    ) -> std::io::Result<()> {
        let mut code = vec![first];
        code.extend(read_until_eot(stream).await?);
        let response = build_response(&code, vars);
        stream.write_all(&response).await
    }
}

async fn read_byte(stream: &mut DuplexStream) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).await?;
    Ok(buf[0])
}

async fn read_until_eot(stream: &mut DuplexStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    loop {
        let b = read_byte(stream).await?;
        if b == EOT {
            return Ok(buf);
        }
        buf.push(b);
    }
}

/// Synthesize the wire response for one execute cycle: `"OK" + stdout +
/// (EOT + stderr, if the fragment raised) + TERMINATOR`. The leading `"OK"`
/// is only ever separately consumed by a plain-Raw ack read — in the
/// raw-paste path it rides along in the terminator-delimited payload and is
/// stripped defensively by `mpy_parser::split_frame`.
fn build_response(code: &[u8], vars: &mut HashMap<String, i64>) -> Vec<u8> {
    let text = String::from_utf8_lossy(code).to_string();
    let mut out = b"OK".to_vec();
    if text.contains("json.dumps(") {
        out.extend_from_slice(capability_probe_json().as_bytes());
    } else {
        let outcome = eval::evaluate(&text, vars);
        out.extend_from_slice(outcome.stdout.as_bytes());
        if let Some(error) = outcome.error {
            out.push(EOT);
            out.extend_from_slice(error.as_bytes());
        }
    }
    out.extend_from_slice(&TERMINATOR);
    out
}

fn capability_probe_json() -> String {
    r#"{"platform": "fakeboard", "version": "1.2.3", "free_memory": 111000, "features": []}"#.to_string()
}
