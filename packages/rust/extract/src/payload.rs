//! File payload decoding.
//!
//! File bytes may arrive as raw bytes or as a string. A string is decoded as
//! base64 only when every character is in the base64 alphabet; anything else
//! is taken as literal UTF-8 text. Plain words such as `Hellothere12` are
//! valid base64 and decode to binary noise; that ambiguity is inherent to the
//! wire form and is resolved in favour of base64.

use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use tracing::debug;

use triage_shared::{Payload, Result, TriageError};

/// Standard alphabet, padding optional, trailing bits tolerated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

static BASE64_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("valid regex"));

/// Whether a string consists solely of base64 alphabet characters.
pub fn looks_like_base64(data: &str) -> bool {
    BASE64_RE.is_match(data)
}

/// Turn a file payload into bytes. Fails on empty input or empty output.
pub fn decode(payload: &Payload) -> Result<Vec<u8>> {
    let bytes = match payload {
        Payload::Bytes(bytes) => bytes.clone(),
        Payload::Text(data) => {
            if data.is_empty() {
                return Err(TriageError::extraction("file data is empty"));
            }
            decode_text(data)
        }
    };

    if bytes.is_empty() {
        return Err(TriageError::extraction(
            "file buffer is empty after processing",
        ));
    }
    Ok(bytes)
}

fn decode_text(data: &str) -> Vec<u8> {
    if !looks_like_base64(data) {
        debug!(len = data.len(), "payload is literal text");
        return data.as_bytes().to_vec();
    }

    match LENIENT_BASE64.decode(data) {
        Ok(bytes) => {
            debug!(decoded = bytes.len(), "payload decoded from base64");
            bytes
        }
        Err(e) => {
            debug!(error = %e, "base64 decode failed, treating payload as literal text");
            data.as_bytes().to_vec()
        }
    }
}
