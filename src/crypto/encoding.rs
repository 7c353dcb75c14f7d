//! Base64 text encoding for key material ("encoded blobs").
//!
//! Output is standard base64 with padding and no line breaks.  Input
//! may contain arbitrary ASCII whitespace (line-wrapped exports from
//! older tools), which is stripped before decoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::errors::{KeyVaultError, Result};

/// Encode raw bytes as a single-line base64 string.
pub fn encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode a base64 string, ignoring any embedded whitespace.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| KeyVaultError::Validation(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_tolerates_line_wrapping() {
        let wrapped = "SGVs\nbG8g\r\nV29y bGQ=\n";
        assert_eq!(decode(wrapped).unwrap(), b"Hello World");
    }

    #[test]
    fn encode_is_single_line() {
        let encoded = encode(&[0u8; 200]);
        assert!(!encoded.contains('\n'));
        assert_eq!(decode(&encoded).unwrap(), vec![0u8; 200]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode("not*base64"),
            Err(KeyVaultError::Validation(_))
        ));
    }
}
