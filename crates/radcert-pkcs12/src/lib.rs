//! Legacy PKCS#12 (PFX) pipeline for radcert.
//!
//! Modern crypto libraries dropped PKCS#12's original password-based
//! encryption scheme (`pbeWithSHAAnd3-KeyTripleDES-CBC`,
//! `pbeWithSHAAnd40BitRC2-CBC`), but legacy RADIUS supplicants and OS
//! certificate stores still require it for importable `.p12` bundles.
//! This crate reproduces it exactly:
//!
//! - [`kdf`] - the RFC 7292 Appendix B.2 key/IV/MAC-key derivation
//!   function, bit-exact against the published test vectors.
//! - [`pbe`] - the PBES1 cipher engine (RC2-40-CBC and DES-EDE3-CBC).
//! - [`pfx`] - container assembly: encrypted certificate safe, shrouded
//!   key bag, HMAC-SHA-1 integrity MAC.
//! - [`parse`] - the matching reader, used for round-trip verification
//!   and for importing externally produced bundles.
//!
//! # Example
//!
//! ```no_run
//! use radcert_pkcs12::{parse_pfx, PfxBuilder};
//!
//! # let (cert_der, key_der, ca_der) = (vec![], vec![], vec![]);
//! let pfx = PfxBuilder::new(cert_der, key_der)
//!     .trust_anchor(ca_der)
//!     .build("test1234")
//!     .unwrap();
//!
//! let contents = parse_pfx(&pfx, "test1234").unwrap();
//! assert_eq!(contents.private_keys.len(), 1);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod kdf;
pub mod mac;
pub mod oid;
pub mod parse;
pub mod pbe;
pub mod pfx;

pub use error::{Error, Result};
pub use parse::{parse as parse_pfx, PfxContents};
pub use pbe::PbeCipher;
pub use pfx::{PfxBuilder, DEFAULT_ITERATIONS};

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cert_and_key(name: &str) -> (Vec<u8>, Vec<u8>) {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, name);
        let cert = params.self_signed(&key).unwrap();
        (cert.der().to_vec(), key.serialize_der())
    }

    #[test]
    fn export_then_import_round_trip() {
        let (leaf_der, key_der) = test_cert_and_key("radius-client");
        let (ca_der, _) = test_cert_and_key("radcert Root CA");

        let pfx = PfxBuilder::new(leaf_der.clone(), key_der.clone())
            .trust_anchor(ca_der.clone())
            .build("test1234")
            .unwrap();

        let contents = parse_pfx(&pfx, "test1234").unwrap();

        // Leaf first, then trust anchors, key recovered byte-identical.
        assert_eq!(contents.certificates.len(), 2);
        assert_eq!(contents.certificates[0], leaf_der);
        assert_eq!(contents.certificates[1], ca_der);
        assert_eq!(contents.private_keys, vec![key_der]);
    }

    #[test]
    fn recovered_key_still_signs() {
        let (leaf_der, key_der) = test_cert_and_key("radius-client");
        let pfx = PfxBuilder::new(leaf_der, key_der)
            .build("test1234")
            .unwrap();

        let contents = parse_pfx(&pfx, "test1234").unwrap();
        // The PKCS#8 blob must round-trip into a usable key pair.
        let recovered = rcgen::KeyPair::try_from(contents.private_keys[0].as_slice()).unwrap();
        assert!(!recovered.serialize_der().is_empty());
    }

    #[test]
    fn wrong_password_fails_mac_check() {
        let (leaf_der, key_der) = test_cert_and_key("radius-client");
        let pfx = PfxBuilder::new(leaf_der, key_der)
            .build("test1234")
            .unwrap();

        let result = parse_pfx(&pfx, "nottest1234");
        assert!(matches!(result, Err(Error::IntegrityCheck)));
    }

    #[test]
    fn tampered_container_fails_mac_check() {
        let (leaf_der, key_der) = test_cert_and_key("radius-client");
        let mut pfx = PfxBuilder::new(leaf_der, key_der)
            .build("test1234")
            .unwrap();

        // Flip a bit somewhere inside the encrypted certificate safe.
        let middle = pfx.len() / 2;
        pfx[middle] ^= 0x01;
        let result = parse_pfx(&pfx, "test1234");
        assert!(result.is_err());
    }

    #[test]
    fn empty_password_round_trip() {
        let (leaf_der, key_der) = test_cert_and_key("radius-client");
        let pfx = PfxBuilder::new(leaf_der.clone(), key_der)
            .build("")
            .unwrap();
        let contents = parse_pfx(&pfx, "").unwrap();
        assert_eq!(contents.certificates[0], leaf_der);
    }

    #[test]
    fn export_without_anchors() {
        let (leaf_der, key_der) = test_cert_and_key("standalone");
        let pfx = PfxBuilder::new(leaf_der.clone(), key_der)
            .build("pw")
            .unwrap();
        let contents = parse_pfx(&pfx, "pw").unwrap();
        assert_eq!(contents.certificates, vec![leaf_der]);
    }
}
