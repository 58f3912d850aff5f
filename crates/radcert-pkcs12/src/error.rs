//! PKCS#12 error types.

use thiserror::Error;

/// Result type for PKCS#12 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// PKCS#12 error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested or encoded cipher is not one of the two legacy PBES1
    /// schemes this crate implements. There is no fallback.
    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    /// A symmetric encryption or decryption primitive failed.
    #[error("cipher operation failed: {0}")]
    Crypto(String),

    /// The container bytes do not form a valid PFX structure.
    #[error("malformed PKCS#12 structure: {0}")]
    Malformed(String),

    /// The integrity MAC did not verify. Either the password is wrong or
    /// the container was tampered with.
    #[error("PKCS#12 MAC verification failed")]
    IntegrityCheck,
}

impl From<yasna::ASN1Error> for Error {
    fn from(err: yasna::ASN1Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
