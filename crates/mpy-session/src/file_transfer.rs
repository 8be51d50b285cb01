//! Put-file / get-file fragment synthesis (spec.md §6).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub(crate) const FILE_NOT_FOUND_SENTINEL: &str = "FILE_NOT_FOUND";

/// Synthesize the fragment that writes `bytes` to `remote_path` on the device.
pub(crate) fn put_fragment(remote_path: &str, bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    format!(
        "import binascii; f=open('{remote}','wb'); f.write(binascii.a2b_base64('{b64}')); f.close()",
        remote = remote_path,
        b64 = encoded,
    )
}

/// Synthesize the fragment that reads `remote_path` back as base64, or
/// prints the not-found sentinel if the file doesn't exist.
pub(crate) fn get_fragment(remote_path: &str) -> String {
    format!(
        "import binascii\ntry:\n    f=open('{remote}','rb')\n    print(binascii.b2a_base64(f.read()).decode().strip())\n    f.close()\nexcept OSError:\n    print('{sentinel}')",
        remote = remote_path,
        sentinel = FILE_NOT_FOUND_SENTINEL,
    )
}

/// Decode the base64 value returned by [`get_fragment`]'s execution.
pub(crate) fn decode_get_result(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(value.trim())
}
