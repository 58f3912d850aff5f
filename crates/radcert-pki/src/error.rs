//! Error types for certificate operations.

use thiserror::Error;

/// Errors that can occur during certificate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A singleton certificate (CA or server) already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The requested certificate was not found.
    #[error("certificate not found: {0}")]
    NotFound(String),

    /// The certificate has already been revoked.
    #[error("certificate already revoked: {0}")]
    AlreadyRevoked(String),

    /// An operation requires a certificate that does not exist yet.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// The operation requires a private key that is not held.
    #[error("private key not available for {0}")]
    MissingPrivateKey(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    Generation(String),

    /// Certificate signing failed.
    #[error("certificate signing failed: {0}")]
    Signing(String),

    /// Certificate or key parsing failed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A signature did not verify against the issuer public key.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// The certificate validity window has passed.
    #[error("certificate expired at {0}")]
    Expired(chrono::DateTime<chrono::Utc>),

    /// The certificate validity window has not started.
    #[error("certificate not valid until {0}")]
    NotYetValid(chrono::DateTime<chrono::Utc>),

    /// A chain link is broken (issuer mismatch or bad signature).
    #[error("invalid certificate chain: {0}")]
    InvalidChain(String),

    /// PKCS#12 container processing failed.
    #[error("pkcs#12 error: {0}")]
    Pkcs12(#[from] radcert_pkcs12::Error),
}

/// Result type for certificate operations.
pub type Result<T> = std::result::Result<T, Error>;
