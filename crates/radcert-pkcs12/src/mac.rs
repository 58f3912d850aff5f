//! PFX integrity MAC (HMAC-SHA-1 over the AuthenticatedSafe content).
//!
//! The MAC key comes out of the RFC 7292 KDF with purpose id 3. This is
//! tamper detection only, keyed by the same export password, independent
//! of the two PBES1 encryptions inside the container.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::kdf;

type HmacSha1 = Hmac<Sha1>;

/// Iteration count for MAC key derivation. Legacy exporters use 1.
pub const MAC_ITERATIONS: u32 = 1;

/// HMAC-SHA-1 output and key size in bytes.
const MAC_KEY_LEN: usize = 20;

/// Computes the integrity digest over `data`.
#[must_use]
pub fn compute(password: &str, salt: &[u8], iterations: u32, data: &[u8]) -> Vec<u8> {
    let pw = kdf::bmp_password(password);
    let mut key = kdf::derive(&pw, salt, kdf::ID_MAC, iterations, MAC_KEY_LEN);
    #[allow(clippy::expect_used)]
    let mut hmac = HmacSha1::new_from_slice(&key).expect("HMAC accepts any key length");
    key.zeroize();
    hmac.update(data);
    hmac.finalize().into_bytes().to_vec()
}

/// Verifies a received digest in constant time.
///
/// # Errors
///
/// Returns [`Error::IntegrityCheck`] on mismatch. A wrong password and
/// a tampered container produce the same error.
pub fn verify(
    password: &str,
    salt: &[u8],
    iterations: u32,
    data: &[u8],
    expected: &[u8],
) -> Result<()> {
    let pw = kdf::bmp_password(password);
    let mut key = kdf::derive(&pw, salt, kdf::ID_MAC, iterations, MAC_KEY_LEN);
    #[allow(clippy::expect_used)]
    let mut hmac = HmacSha1::new_from_slice(&key).expect("HMAC accepts any key length");
    key.zeroize();
    hmac.update(data);
    hmac.verify_slice(expected).map_err(|_| Error::IntegrityCheck)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_then_verify() {
        let digest = compute("test1234", b"macsalt8", MAC_ITERATIONS, b"auth safe bytes");
        assert_eq!(digest.len(), 20);
        verify(
            "test1234",
            b"macsalt8",
            MAC_ITERATIONS,
            b"auth safe bytes",
            &digest,
        )
        .unwrap();
    }

    #[test]
    fn wrong_password_fails() {
        let digest = compute("test1234", b"macsalt8", MAC_ITERATIONS, b"auth safe bytes");
        let result = verify(
            "wrong",
            b"macsalt8",
            MAC_ITERATIONS,
            b"auth safe bytes",
            &digest,
        );
        assert!(matches!(result, Err(Error::IntegrityCheck)));
    }

    #[test]
    fn tampered_data_fails() {
        let digest = compute("test1234", b"macsalt8", MAC_ITERATIONS, b"auth safe bytes");
        let result = verify(
            "test1234",
            b"macsalt8",
            MAC_ITERATIONS,
            b"auth safe bytez",
            &digest,
        );
        assert!(matches!(result, Err(Error::IntegrityCheck)));
    }
}
