//! Length-prefixed frame codec.
//!
//! Every message in both directions is one frame:
//! - Length: 4 bytes BE (byte count of the payload)
//! - Payload: UTF-8 JSON

use serde_json::Value;

use crate::error::{ClientError, Result};

/// Size of the length prefix in bytes.
pub const LEN_PREFIX_BYTES: usize = 4;

/// Upper bound on a single inbound frame.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024; // 64MB

/// How much of a malformed payload is echoed into the parse error message.
const PARSE_ERROR_CONTEXT_BYTES: usize = 500;

/// Prepend the big-endian length prefix to a payload.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
  let mut frame = Vec::with_capacity(LEN_PREFIX_BYTES + payload.len());
  frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
  frame.extend_from_slice(payload);
  frame
}

/// Decode the 4-byte big-endian length prefix.
pub fn decode_length(prefix: [u8; LEN_PREFIX_BYTES]) -> u32 {
  u32::from_be_bytes(prefix)
}

/// Serialize a JSON value into payload bytes.
pub fn encode_json(value: &Value) -> Result<Vec<u8>> {
  serde_json::to_vec(value).map_err(|e| ClientError::JsonParse(e.to_string()))
}

/// Parse payload bytes as JSON.
///
/// On failure the error message carries the first 500 bytes of the payload
/// so the offending frame can be identified in logs.
pub fn decode_json(bytes: &[u8]) -> Result<Value> {
  serde_json::from_slice(bytes).map_err(|e| {
    let shown = &bytes[..bytes.len().min(PARSE_ERROR_CONTEXT_BYTES)];
    ClientError::JsonParse(format!(
      "{}; payload begins: {}",
      e,
      String::from_utf8_lossy(shown)
    ))
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_frame_layout() {
    let frame = encode_frame(br#"{"a":1}"#);
    assert_eq!(
      frame,
      [0x00, 0x00, 0x00, 0x07, 0x7B, 0x22, 0x61, 0x22, 0x3A, 0x31, 0x7D]
    );
  }

  #[test]
  fn test_length_roundtrip() {
    for len in [0usize, 1, 6, 255, 65_536, 16_777_215] {
      let payload = vec![b'x'; len];
      let frame = encode_frame(&payload);
      let mut prefix = [0u8; LEN_PREFIX_BYTES];
      prefix.copy_from_slice(&frame[..LEN_PREFIX_BYTES]);
      assert_eq!(decode_length(prefix) as usize, len);
      assert_eq!(&frame[LEN_PREFIX_BYTES..], &payload[..]);
    }
  }

  #[test]
  fn test_decode_json_error_includes_payload() {
    let err = decode_json(b"not-json-at-all").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("not-json-at-all"), "message was: {}", msg);
    assert_eq!(err.code(), 100);
  }

  #[test]
  fn test_decode_json_error_truncates_long_payload() {
    let mut payload = vec![b'{'];
    payload.extend(std::iter::repeat(b'z').take(2000));
    let err = decode_json(&payload).unwrap_err();
    // 500 bytes of context plus the parser's own message, never the full 2KB
    assert!(err.to_string().len() < 700);
  }
}
