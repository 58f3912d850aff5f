//! Certificate authority engine for RADIUS EAP-TLS deployments.
//!
//! One self-signed certificate authority issues a single RADIUS server
//! certificate and any number of client certificates. Certificates
//! carry the exact extension set 802.1X supplicants expect (critical
//! KeyUsage and ExtendedKeyUsage including id-kp-eapOverLAN, BMPString
//! subject names) and export as legacy PKCS#12 bundles via the
//! `radcert-pkcs12` crate.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use radcert_pki::{CertificateManager, KeyParams, MemoryCertStore, Rdn};
//!
//! # fn main() -> radcert_pki::Result<()> {
//! let manager = CertificateManager::new(Arc::new(MemoryCertStore::new()));
//!
//! let ca = manager.create_certificate_authority(
//!     Rdn::new("Example Root CA", "Example")?,
//!     3650,
//!     KeyParams::EcdsaP256,
//! )?;
//!
//! let client = manager.create_client_certificate(
//!     Rdn::new("client-1", "Example")?,
//!     365,
//!     KeyParams::EcdsaP256,
//! )?;
//! assert_eq!(client.issuer(), ca.subject());
//!
//! let pfx = manager.export_client_pkcs12(client.serial_number(), "test1234")?;
//! assert!(!pfx.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod manager;
pub mod storage;
pub mod types;
pub mod validation;

pub use builder::CertificateBuilder;
pub use error::{Error, Result};
pub use manager::CertificateManager;
pub use storage::{CertStateStore, MemoryCertStore, PersistedCertificate, SingletonRole};
pub use types::{
    Certificate, CertificateMetadata, CertificateRole, CertificateSummary, ExtendedKeyUsages,
    KeyParams, KeyUsages, PrivateKey, Rdn, SerialNumber,
};
pub use validation::{is_expired, is_valid_now, remaining_validity, validate_certificate, validate_chain};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn rdn(cn: &str) -> Rdn {
        Rdn::new(cn, "Example").unwrap()
    }

    fn manager() -> CertificateManager {
        CertificateManager::new(Arc::new(MemoryCertStore::new()))
    }

    #[test]
    fn full_deployment_workflow() {
        let mgr = manager();

        let ca = mgr
            .create_certificate_authority(rdn("Example Root CA"), 3650, KeyParams::EcdsaP256)
            .unwrap();
        let server = mgr
            .create_server_certificate(rdn("radius.example.org"), 365, KeyParams::EcdsaP256)
            .unwrap();
        let client = mgr
            .create_client_certificate(rdn("alice"), 365, KeyParams::EcdsaP256)
            .unwrap();

        // Chain integrity across every issued certificate.
        assert_eq!(ca.issuer(), ca.subject());
        assert_eq!(server.issuer(), ca.subject());
        assert_eq!(client.issuer(), ca.subject());
        validate_chain(&[server.clone(), ca.clone()]).unwrap();
        validate_chain(&[client.clone(), ca.clone()]).unwrap();

        // Export and parse back with a standard PKCS#12 reader.
        let pfx = mgr
            .export_client_pkcs12(client.serial_number(), "test1234")
            .unwrap();
        let contents = radcert_pkcs12::parse_pfx(&pfx, "test1234").unwrap();
        assert_eq!(contents.certificates[0], client.der());
        assert_eq!(contents.private_keys.len(), 1);

        // The recovered serial matches the issued one.
        use x509_parser::prelude::*;
        let (_, reparsed) = X509Certificate::from_der(&contents.certificates[0]).unwrap();
        let mut expected = client.serial_number().as_bytes().to_vec();
        // DER strips no bytes but may prepend 0x00 for a set high bit.
        if reparsed.raw_serial().len() == 17 {
            expected.insert(0, 0);
        }
        assert_eq!(reparsed.raw_serial(), expected.as_slice());

        // The recovered key signs under the exported certificate's
        // public key (rcgen re-derives the public half from the key).
        let key = rcgen::KeyPair::try_from(contents.private_keys[0].as_slice()).unwrap();
        assert_eq!(
            key.public_key_der(),
            rcgen::KeyPair::try_from(client.private_key().unwrap().der())
                .unwrap()
                .public_key_der()
        );
    }

    #[test]
    fn singleton_enforcement_and_revocation_history() {
        let mgr = manager();
        let ca = mgr
            .create_certificate_authority(rdn("Example Root CA"), 3650, KeyParams::EcdsaP256)
            .unwrap();

        let second =
            mgr.create_certificate_authority(rdn("Other CA"), 3650, KeyParams::EcdsaP256);
        assert!(matches!(second, Err(Error::AlreadyExists(_))));

        mgr.revoke_certificate_authority(ca.serial_number()).unwrap();
        // Revocation is not deletion: get() filters, history remains,
        // and a second revoke is rejected rather than ignored.
        assert!(mgr.certificate_authority().unwrap().is_none());
        let again = mgr.revoke_certificate_authority(ca.serial_number());
        assert!(matches!(again, Err(Error::AlreadyRevoked(_))));
    }

    #[test]
    fn ca_key_usage_leading_octet() {
        let usages = CertificateRole::Ca.key_usages();
        assert_eq!(usages.leading_octet(), 0x86);
    }

    #[test]
    fn server_without_ca_leaves_no_partial_state() {
        let mgr = manager();
        let result =
            mgr.create_server_certificate(rdn("radius.example.org"), 365, KeyParams::EcdsaP256);
        assert!(matches!(result, Err(Error::MissingDependency(_))));
        assert!(mgr.server_certificate().unwrap().is_none());
    }

    #[test]
    fn summary_projection() {
        let mgr = manager();
        let ca = mgr
            .create_certificate_authority(rdn("Example Root CA"), 3650, KeyParams::EcdsaP256)
            .unwrap();

        let summary = ca.summary().unwrap();
        assert_eq!(summary.subject, *ca.subject());
        assert_eq!(summary.issuer, *ca.issuer());
        assert_eq!(summary.serial_number, ca.serial_number().to_string());
        assert!(!summary.public_key.is_empty());
        assert!(!summary.signature.is_empty());
        assert!(summary.public_key.chars().all(|c| c.is_ascii_hexdigit()));

        // The summary serializes for the API layer.
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("serial_number"));
    }
}
