//! Content identity hashing for cross-run deduplication.

use ring::digest::{digest, SHA256};

/// Field separator inside the digest input. Keeps "ab" + "c" and "a" + "bc"
/// from hashing identically.
const FIELD_SEPARATOR: u8 = 0x1f;

/// Stable identity hash over the four message fields, hex-encoded SHA-256.
///
/// The provider message id is the primary dedup key; this hash is the
/// secondary key, guarding against the same content arriving under a fresh
/// provider id. Identical inputs always produce the identical hash.
pub fn content_fingerprint(subject: &str, body: &str, sender: &str, sent_at: &str) -> String {
    let mut input =
        Vec::with_capacity(subject.len() + body.len() + sender.len() + sent_at.len() + 3);
    for (idx, field) in [subject, body, sender, sent_at].iter().enumerate() {
        if idx > 0 {
            input.push(FIELD_SEPARATOR);
        }
        input.extend_from_slice(field.as_bytes());
    }

    hex_encode(digest(&SHA256, &input).as_ref())
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
