//! HMAC-SHA256 payload signing and verification.
//!
//! The signature covers the exact body bytes sent on the wire and is
//! carried as `X-Signature: sha256=<lowercase hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes the signature header value for `payload` under `secret`.
///
/// Pure and deterministic: the same bytes and key always give the same
/// value.
///
/// # Example
///
/// ```
/// use hookcast::webhook::sign;
///
/// let header = sign(br#"{"event":"mention"}"#, b"s3cr3t");
/// assert!(header.starts_with("sha256="));
/// assert_eq!(header.len(), "sha256=".len() + 64);
/// ```
#[must_use]
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac(payload, secret)))
}

/// Checks a received signature header against the body and secret.
///
/// Strips the `sha256=` prefix, decodes the hex digest and compares it
/// in constant time. Returns false for a missing prefix or malformed hex.
#[must_use]
pub fn verify(payload: &[u8], secret: &[u8], header_value: &str) -> bool {
    let Some(hex_digest) = header_value.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(received) = hex::decode(hex_digest) else {
        return false;
    };

    let expected = mac(payload, secret);
    expected.as_slice().ct_eq(&received).into()
}

fn mac(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}
