//! Object identifiers used by the PFX container.
//!
//! Grouped here as arc slices (the form `yasna` consumes) to avoid magic
//! numbers scattered across the writer and reader.

/// PKCS#7 `data` content type.
pub const PKCS7_DATA: &[u64] = &[1, 2, 840, 113_549, 1, 7, 1];
/// PKCS#7 `encryptedData` content type.
pub const PKCS7_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113_549, 1, 7, 6];

/// `pbeWithSHAAnd3-KeyTripleDES-CBC` (RFC 7292 Appendix C).
pub const PBE_SHA1_3KEY_TRIPLE_DES_CBC: &[u64] = &[1, 2, 840, 113_549, 1, 12, 1, 3];
/// `pbeWithSHAAnd40BitRC2-CBC` (RFC 7292 Appendix C).
pub const PBE_SHA1_40BIT_RC2_CBC: &[u64] = &[1, 2, 840, 113_549, 1, 12, 1, 6];

/// `pkcs8ShroudedKeyBag` safe bag type.
pub const SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113_549, 1, 12, 10, 1, 2];
/// `certBag` safe bag type.
pub const CERT_BAG: &[u64] = &[1, 2, 840, 113_549, 1, 12, 10, 1, 3];
/// `x509Certificate` cert bag content type.
pub const X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113_549, 1, 9, 22, 1];

/// PKCS#9 `friendlyName` bag attribute.
pub const FRIENDLY_NAME: &[u64] = &[1, 2, 840, 113_549, 1, 9, 20];
/// PKCS#9 `localKeyId` bag attribute.
pub const LOCAL_KEY_ID: &[u64] = &[1, 2, 840, 113_549, 1, 9, 21];

/// SHA-1 digest algorithm (used by the integrity MAC).
pub const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
