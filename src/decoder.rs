//! Turns raw file bytes into a `String`.
//!
//! A byte-order mark wins, then an explicitly declared label, then
//! `chardetng` guesses. Malformed input is an error rather than being
//! decoded with replacement characters.

use crate::error::{Error, Result};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
}

/// Decode with automatic encoding detection.
pub fn decode(bytes: &[u8]) -> Result<Decoded> {
    decode_with_label(bytes, None)
}

/// Decode using `label` (e.g. `"gbk"`) when given, detecting otherwise.
pub fn decode_with_label(bytes: &[u8], label: Option<&str>) -> Result<Decoded> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        debug!(encoding = encoding.name(), "Byte-order mark found");
        return decode_as(encoding, &bytes[bom_len..]);
    }

    let encoding = match label {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::UnsupportedEncoding(label.to_string()))?,
        None => detect(bytes),
    };
    decode_as(encoding, bytes)
}

fn detect(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    debug!(encoding = encoding.name(), "Detected encoding");
    encoding
}

fn decode_as(encoding: &'static Encoding, bytes: &[u8]) -> Result<Decoded> {
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or(Error::Decode {
            encoding: encoding.name(),
        })?;
    Ok(Decoded {
        text: text.into_owned(),
        encoding: encoding.name(),
    })
}
