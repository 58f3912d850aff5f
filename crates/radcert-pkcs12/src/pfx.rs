//! PFX (PKCS#12) container assembly.
//!
//! Produces the exact shape legacy consumers expect: an AuthenticatedSafe
//! with an RC2-40-encrypted certificate safe followed by a plain safe
//! holding one triple-DES-shrouded PKCS#8 key bag, the whole thing sealed
//! with an HMAC-SHA-1 integrity MAC.

use rand::Rng;
use tracing::debug;
use yasna::models::ObjectIdentifier;
use yasna::tags::TAG_BMPSTRING;
use yasna::{DERWriter, Tag};

use crate::error::Result;
use crate::mac;
use crate::oid;
use crate::pbe::PbeCipher;

/// Iteration count used for both PBES1 encryptions, matching what legacy
/// exporters (OpenSSL 1.x, node-forge) emit by default.
pub const DEFAULT_ITERATIONS: u32 = 2048;

/// Friendly name attached to the leaf certificate bag.
const LEAF_FRIENDLY_NAME: &str = "certificate";
/// Friendly name attached to additional trust-anchor certificate bags.
const ANCHOR_FRIENDLY_NAME: &str = "trust anchor";
/// Friendly name attached to the shrouded key bag.
const KEY_FRIENDLY_NAME: &str = "private key";

/// Builder for a password-protected PFX bundle.
///
/// The leaf certificate and its PKCS#8 private key share a random
/// local-key-id attribute so consuming software pairs them correctly.
#[derive(Debug, Clone)]
pub struct PfxBuilder {
    leaf_cert_der: Vec<u8>,
    key_pkcs8_der: Vec<u8>,
    trust_anchors: Vec<Vec<u8>>,
    iterations: u32,
}

impl PfxBuilder {
    /// Creates a builder for the given leaf certificate and private key,
    /// both DER-encoded.
    #[must_use]
    pub fn new(leaf_cert_der: Vec<u8>, key_pkcs8_der: Vec<u8>) -> Self {
        Self {
            leaf_cert_der,
            key_pkcs8_der,
            trust_anchors: Vec::new(),
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Adds a trust-anchor certificate (CA or server) to the bundle.
    #[must_use]
    pub fn trust_anchor(mut self, cert_der: Vec<u8>) -> Self {
        self.trust_anchors.push(cert_der);
        self
    }

    /// Overrides the PBES1 iteration count. Intended for tests; the
    /// default matches what deployed supplicants were built against.
    #[must_use]
    pub const fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Assembles the PFX bytes, encrypting under `password`.
    ///
    /// Either the complete container is returned or an error - never a
    /// partial bundle.
    pub fn build(&self, password: &str) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        let local_key_id: [u8; 4] = rng.r#gen();
        let cert_salt: [u8; 8] = rng.r#gen();
        let key_salt: [u8; 8] = rng.r#gen();
        let mac_salt: [u8; 8] = rng.r#gen();

        // Safe 1: CertBags, leaf first, encrypted with RC2-40 PBES1.
        let cert_safe_plain = yasna::construct_der(|writer| {
            writer.write_sequence_of(|writer| {
                write_cert_bag(
                    writer.next(),
                    &self.leaf_cert_der,
                    LEAF_FRIENDLY_NAME,
                    Some(&local_key_id),
                );
                for anchor in &self.trust_anchors {
                    write_cert_bag(writer.next(), anchor, ANCHOR_FRIENDLY_NAME, None);
                }
            });
        });
        let cert_safe_encrypted = PbeCipher::Sha1And40BitRc2Cbc.encrypt(
            password,
            &cert_salt,
            self.iterations,
            &cert_safe_plain,
        )?;

        // Safe 2: one PKCS8-shrouded key bag, key encrypted with 3DES PBES1.
        let shrouded_key = PbeCipher::Sha1And3KeyTripleDesCbc.encrypt(
            password,
            &key_salt,
            self.iterations,
            &self.key_pkcs8_der,
        )?;
        let key_safe_plain = yasna::construct_der(|writer| {
            writer.write_sequence_of(|writer| {
                write_shrouded_key_bag(
                    writer.next(),
                    PbeCipher::Sha1And3KeyTripleDesCbc,
                    &key_salt,
                    self.iterations,
                    &shrouded_key,
                    &local_key_id,
                );
            });
        });

        // AuthenticatedSafe ::= SEQUENCE OF ContentInfo
        let auth_safe = yasna::construct_der(|writer| {
            writer.write_sequence_of(|writer| {
                write_encrypted_data_content_info(
                    writer.next(),
                    PbeCipher::Sha1And40BitRc2Cbc,
                    &cert_salt,
                    self.iterations,
                    &cert_safe_encrypted,
                );
                write_data_content_info(writer.next(), &key_safe_plain);
            });
        });

        let digest = mac::compute(password, &mac_salt, mac::MAC_ITERATIONS, &auth_safe);

        // PFX ::= SEQUENCE { version, authSafe ContentInfo, macData }
        let pfx = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_u8(3);
                write_data_content_info(writer.next(), &auth_safe);
                writer.next().write_sequence(|writer| {
                    writer.next().write_sequence(|writer| {
                        write_algorithm_identifier_null(writer.next(), oid::SHA1);
                        writer.next().write_bytes(&digest);
                    });
                    writer.next().write_bytes(&mac_salt);
                    writer.next().write_u32(mac::MAC_ITERATIONS);
                });
            });
        });

        debug!(
            bytes = pfx.len(),
            anchors = self.trust_anchors.len(),
            "PFX bundle assembled"
        );

        Ok(pfx)
    }
}

/// ContentInfo carrying plain PKCS#7 `data`.
fn write_data_content_info(writer: DERWriter, content: &[u8]) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(oid::PKCS7_DATA));
        writer.next().write_tagged(Tag::context(0), |writer| {
            writer.write_bytes(content);
        });
    });
}

/// ContentInfo carrying PKCS#7 `encryptedData` under a PBES1 algorithm.
fn write_encrypted_data_content_info(
    writer: DERWriter,
    cipher: PbeCipher,
    salt: &[u8],
    iterations: u32,
    ciphertext: &[u8],
) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(oid::PKCS7_ENCRYPTED_DATA));
        writer.next().write_tagged(Tag::context(0), |writer| {
            writer.write_sequence(|writer| {
                // EncryptedData version
                writer.next().write_u8(0);
                // EncryptedContentInfo
                writer.next().write_sequence(|writer| {
                    writer
                        .next()
                        .write_oid(&ObjectIdentifier::from_slice(oid::PKCS7_DATA));
                    write_pbe_algorithm_identifier(writer.next(), cipher, salt, iterations);
                    writer
                        .next()
                        .write_tagged_implicit(Tag::context(0), |writer| {
                            writer.write_bytes(ciphertext);
                        });
                });
            });
        });
    });
}

/// AlgorithmIdentifier with `pkcs-12PbeParams { salt, iterations }`.
fn write_pbe_algorithm_identifier(writer: DERWriter, cipher: PbeCipher, salt: &[u8], iterations: u32) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(cipher.oid()));
        writer.next().write_sequence(|writer| {
            writer.next().write_bytes(salt);
            writer.next().write_u32(iterations);
        });
    });
}

/// AlgorithmIdentifier with an explicit NULL parameter (digest algorithms).
fn write_algorithm_identifier_null(writer: DERWriter, arcs: &[u64]) {
    writer.write_sequence(|writer| {
        writer.next().write_oid(&ObjectIdentifier::from_slice(arcs));
        writer.next().write_null();
    });
}

/// SafeBag holding an X.509 certificate.
fn write_cert_bag(writer: DERWriter, cert_der: &[u8], friendly_name: &str, key_id: Option<&[u8]>) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(oid::CERT_BAG));
        writer.next().write_tagged(Tag::context(0), |writer| {
            writer.write_sequence(|writer| {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(oid::X509_CERTIFICATE));
                writer.next().write_tagged(Tag::context(0), |writer| {
                    writer.write_bytes(cert_der);
                });
            });
        });
        write_bag_attributes(writer.next(), friendly_name, key_id);
    });
}

/// SafeBag holding a PKCS8-shrouded (PBES1-encrypted) private key.
fn write_shrouded_key_bag(
    writer: DERWriter,
    cipher: PbeCipher,
    salt: &[u8],
    iterations: u32,
    shrouded_key: &[u8],
    key_id: &[u8],
) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(oid::SHROUDED_KEY_BAG));
        writer.next().write_tagged(Tag::context(0), |writer| {
            // EncryptedPrivateKeyInfo
            writer.write_sequence(|writer| {
                write_pbe_algorithm_identifier(writer.next(), cipher, salt, iterations);
                writer.next().write_bytes(shrouded_key);
            });
        });
        write_bag_attributes(writer.next(), KEY_FRIENDLY_NAME, Some(key_id));
    });
}

/// PKCS#9 bag attributes: friendlyName (BMPString) and optional localKeyId.
fn write_bag_attributes(writer: DERWriter, friendly_name: &str, key_id: Option<&[u8]>) {
    writer.write_set_of(|writer| {
        writer.next().write_sequence(|writer| {
            writer
                .next()
                .write_oid(&ObjectIdentifier::from_slice(oid::FRIENDLY_NAME));
            writer.next().write_set_of(|writer| {
                writer
                    .next()
                    .write_tagged_implicit(TAG_BMPSTRING, |writer| {
                        writer.write_bytes(&utf16_be(friendly_name));
                    });
            });
        });
        if let Some(id) = key_id {
            writer.next().write_sequence(|writer| {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(oid::LOCAL_KEY_ID));
                writer.next().write_set_of(|writer| {
                    writer.next().write_bytes(id);
                });
            });
        }
    });
}

/// Encodes a string as BMPString content bytes (UTF-16BE, no terminator).
fn utf16_be(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .flat_map(u16::to_be_bytes)
        .collect()
}
