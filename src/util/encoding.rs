// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Inline payload encoding helpers.
//!
//! Conversions between raw bytes, base64 strings, and `data:` URLs.
//! These helpers propagate errors; store-level callers decide whether
//! to absorb them into logged failure flags.

use base64::{engine::general_purpose, Engine};

/// Encode raw bytes as a base64 string.
pub fn encode_bytes(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode a base64 string back into raw bytes.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(data)
}

/// Whether a string is a `data:` URL rather than a bare payload or path.
pub fn is_data_url(s: &str) -> bool {
    s.starts_with("data:")
}

/// Extract the bare base64 part of a `data:` URL.
///
/// Strings without a comma are returned unchanged, so bare base64
/// payloads pass through safely.
pub fn strip_data_url(s: &str) -> &str {
    match s.split_once(',') {
        Some((_, rest)) => rest,
        None => s,
    }
}

/// Build a `data:` URL from a MIME type and raw bytes.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, encode_bytes(bytes))
}

/// Guess the MIME type of raw image bytes from their magic numbers.
///
/// Falls back to `application/octet-stream` for unrecognized data.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let bytes = b"mask pixels";
        let encoded = encode_bytes(bytes);
        assert_eq!(decode_base64(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("QUJD"), "QUJD");
    }

    #[test]
    fn test_is_data_url() {
        assert!(is_data_url("data:image/png;base64,QUJD"));
        assert!(!is_data_url("/tmp/image.png"));
    }

    #[test]
    fn test_to_data_url() {
        let url = to_data_url("image/png", b"ABC");
        assert_eq!(url, "data:image/png;base64,QUJD");
    }

    #[test]
    fn test_sniff_mime_png() {
        // Minimal PNG signature is enough for format detection.
        let png_magic = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        assert_eq!(sniff_mime(&png_magic), "image/png");
    }

    #[test]
    fn test_sniff_mime_unknown() {
        assert_eq!(sniff_mime(b"not an image"), "application/octet-stream");
    }
}
