//! HMAC-SHA256 verification of GitHub webhook signatures.
//!
//! GitHub signs the raw request body with the shared webhook secret and sends
//! the digest in the `X-Hub-Signature-256` header as `sha256=<hex>`.
//! Verification must run before any other processing of the delivery.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};

type HmacSha256 = Hmac<Sha256>;

/// Required prefix of the `X-Hub-Signature-256` header value
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Length in bytes of a SHA-256 digest
const DIGEST_LEN: usize = 32;

/// Signature verification failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Header is empty
    #[error("signature header is missing")]
    Missing,

    /// Header does not start with `sha256=`
    #[error("signature must use the 'sha256=' prefix")]
    InvalidFormat,

    /// Computed digest does not match, or the provided digest is not valid hex
    #[error("signature does not match payload")]
    Mismatch,

    /// No secret is configured so nothing can be verified
    #[error("webhook secret is not configured")]
    MissingSecret,
}

/// Verify `signature_header` against the HMAC-SHA256 of `payload`.
///
/// The digest is computed over the exact bytes received. Decoding failures
/// and length mismatches still run the constant-time comparison against a
/// zero-padded candidate, so timing never depends on where the provided
/// signature diverges from the expected one.
///
/// # Errors
///
/// - [`SignatureError::Missing`] when the header is empty
/// - [`SignatureError::InvalidFormat`] when the `sha256=` prefix is absent
/// - [`SignatureError::MissingSecret`] when `secret` is empty
/// - [`SignatureError::Mismatch`] for every other failure
pub fn verify_signature(
    signature_header: &str,
    payload: &[u8],
    secret: &[u8],
) -> Result<(), SignatureError> {
    if signature_header.is_empty() {
        return Err(SignatureError::Missing);
    }

    let hex_part = signature_header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::InvalidFormat)?;

    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    let expected = compute_digest(payload, secret);

    let (candidate, well_formed) = decode_candidate(hex_part);
    let matches = expected.as_slice().ct_eq(candidate.as_slice()) & well_formed;

    if bool::from(matches) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Compute the `sha256=<hex>` header value GitHub would send for `payload`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(compute_digest(payload, secret)))
}

fn compute_digest(payload: &[u8], secret: &[u8]) -> [u8; DIGEST_LEN] {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return [0u8; DIGEST_LEN],
    };
    mac.update(payload);

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    digest
}

/// Decode the hex digest into a fixed-size buffer.
///
/// Returns the buffer and a flag that is set only when the input decoded to
/// exactly [`DIGEST_LEN`] bytes. Malformed input yields a zeroed buffer.
fn decode_candidate(hex_part: &str) -> ([u8; DIGEST_LEN], Choice) {
    let mut candidate = [0u8; DIGEST_LEN];
    match hex::decode(hex_part) {
        Ok(bytes) => {
            let len_ok = (bytes.len() as u64).ct_eq(&(DIGEST_LEN as u64));
            let copy_len = bytes.len().min(DIGEST_LEN);
            candidate[..copy_len].copy_from_slice(&bytes[..copy_len]);
            (candidate, len_ok)
        }
        Err(_) => (candidate, Choice::from(0)),
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
