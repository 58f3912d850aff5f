//! Certificate validation utilities.

use chrono::Utc;
use tracing::debug;
use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::types::Certificate;

/// Validates a certificate against its issuing CA certificate.
///
/// This performs the following checks:
/// - The certificate is not expired
/// - The certificate is not yet valid (`not_before` check)
/// - The issuer matches the CA's subject
/// - The certificate was signed by the CA
///
/// # Errors
///
/// Returns an error if validation fails.
pub fn validate_certificate(cert: &Certificate, ca_cert: &Certificate) -> Result<()> {
    debug!("Validating certificate: {}", cert.subject());

    if is_expired(cert) {
        return Err(Error::Expired(cert.not_after()));
    }

    if is_not_yet_valid(cert) {
        return Err(Error::NotYetValid(cert.not_before()));
    }

    if cert.issuer() != ca_cert.subject() {
        return Err(Error::InvalidChain(format!(
            "issuer '{}' does not match CA subject '{}'",
            cert.issuer(),
            ca_cert.subject()
        )));
    }

    verify_signature(cert, ca_cert)?;

    debug!("Certificate validated successfully: {}", cert.subject());

    Ok(())
}

/// Validates a certificate chain ordered end-entity first, root last.
///
/// # Errors
///
/// Returns an error if any link fails validation or the root is not
/// self-signed.
pub fn validate_chain(chain: &[Certificate]) -> Result<()> {
    if chain.is_empty() {
        return Err(Error::InvalidChain("empty certificate chain".into()));
    }

    for i in 0..chain.len() - 1 {
        validate_certificate(&chain[i], &chain[i + 1])?;
    }

    validate_self_signed(&chain[chain.len() - 1])
}

/// Checks if a certificate is expired.
#[must_use]
pub fn is_expired(cert: &Certificate) -> bool {
    cert.not_after() < Utc::now()
}

/// Checks if a certificate is not yet valid.
#[must_use]
pub fn is_not_yet_valid(cert: &Certificate) -> bool {
    cert.not_before() > Utc::now()
}

/// Checks if a certificate is currently within its validity window.
#[must_use]
pub fn is_valid_now(cert: &Certificate) -> bool {
    !is_expired(cert) && !is_not_yet_valid(cert)
}

/// Duration until expiry, or None if already expired.
#[must_use]
pub fn remaining_validity(cert: &Certificate) -> Option<chrono::Duration> {
    let now = Utc::now();
    if cert.not_after() > now {
        Some(cert.not_after() - now)
    } else {
        None
    }
}

/// Validates a self-signed certificate.
fn validate_self_signed(cert: &Certificate) -> Result<()> {
    if cert.issuer() != cert.subject() {
        return Err(Error::InvalidChain(
            "root certificate is not self-signed".into(),
        ));
    }

    verify_signature(cert, cert)
}

/// Verifies that a certificate was signed by the given issuer.
fn verify_signature(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    let (_, parsed_cert) = X509Certificate::from_der(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

    let (_, parsed_issuer) = X509Certificate::from_der(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    parsed_cert
        .verify_signature(Some(parsed_issuer.public_key()))
        .map_err(|e| {
            Error::SignatureVerification(format!(
                "signature verification failed for '{}': {:?}",
                cert.subject(),
                e
            ))
        })?;

    Ok(())
}
