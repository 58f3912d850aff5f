//! PFX (PKCS#12) container parsing.
//!
//! The counterpart to [`crate::pfx`]: verifies the integrity MAC, peels
//! both PBES1 encryption layers and collects certificates and private
//! keys. Only the two legacy ciphers are accepted - a PBES2 container
//! surfaces `UnsupportedCipher`, never a silent fallback.

use tracing::debug;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, ASN1Result, BERReader, Tag};

use crate::error::{Error, Result};
use crate::oid;
use crate::pbe::PbeCipher;

/// Contents recovered from a PFX container.
#[derive(Debug)]
pub struct PfxContents {
    /// DER-encoded X.509 certificates, in container order (leaf first for
    /// bundles produced by [`crate::PfxBuilder`]).
    pub certificates: Vec<Vec<u8>>,
    /// PKCS#8 DER-encoded private keys.
    pub private_keys: Vec<Vec<u8>>,
}

/// Parses a PFX container, verifying its MAC and decrypting with the
/// given password.
pub fn parse(data: &[u8], password: &str) -> Result<PfxContents> {
    // PFX ::= SEQUENCE { version INTEGER 3, authSafe ContentInfo, macData }
    let elements = top_level_elements(data)?;
    let [version_der, auth_safe_der, mac_der] = elements.as_slice() else {
        return Err(Error::Malformed(format!(
            "expected 3 PFX elements, found {}",
            elements.len()
        )));
    };

    let version = yasna::parse_ber(version_der, |reader| reader.read_u8())?;
    if version != 3 {
        return Err(Error::Malformed(format!("unsupported PFX version {version}")));
    }

    let auth_safe = yasna::parse_ber(auth_safe_der, |reader| read_data_content_info(reader))?;

    let (digest, mac_salt, mac_iterations) = parse_mac_data(mac_der)?;
    crate::mac::verify(password, &mac_salt, mac_iterations, &auth_safe, &digest)?;

    let mut contents = PfxContents {
        certificates: Vec::new(),
        private_keys: Vec::new(),
    };

    // AuthenticatedSafe ::= SEQUENCE OF ContentInfo, each either plain
    // data or a PBES1-encrypted certificate safe.
    let safes = yasna::parse_ber(&auth_safe, |reader| {
        reader.collect_sequence_of(|reader| read_content_info(reader))
    })?;

    for safe in safes {
        let plain = match safe {
            ContentInfo::Data(bytes) => bytes,
            ContentInfo::Encrypted {
                alg,
                salt,
                iterations,
                ciphertext,
            } => {
                let cipher = PbeCipher::from_oid(alg.components())?;
                cipher.decrypt(password, &salt, iterations, &ciphertext)?
            }
        };
        read_safe_contents(&plain, password, &mut contents)?;
    }

    debug!(
        certificates = contents.certificates.len(),
        private_keys = contents.private_keys.len(),
        "PFX bundle parsed"
    );

    Ok(contents)
}

enum ContentInfo {
    Data(Vec<u8>),
    Encrypted {
        alg: ObjectIdentifier,
        salt: Vec<u8>,
        iterations: u32,
        ciphertext: Vec<u8>,
    },
}

/// Splits the outer PFX SEQUENCE into raw TLV elements. Working on raw
/// elements keeps trailing OPTIONAL fields (bag attributes, default MAC
/// iteration counts) easy to handle.
fn top_level_elements(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    Ok(yasna::parse_ber(data, |reader| {
        reader.collect_sequence_of(|reader| reader.read_der())
    })?)
}

/// MacData ::= SEQUENCE { mac DigestInfo, macSalt OCTET STRING,
/// iterations INTEGER DEFAULT 1 }
fn parse_mac_data(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>, u32)> {
    let elements = yasna::parse_ber(der, |reader| {
        reader.collect_sequence_of(|reader| reader.read_der())
    })?;
    let (digest_info_der, salt_der, iterations_der) = match elements.as_slice() {
        [d, s] => (d, s, None),
        [d, s, i] => (d, s, Some(i)),
        _ => {
            return Err(Error::Malformed(
                "MacData must have two or three elements".into(),
            ))
        }
    };

    let digest = yasna::parse_ber(digest_info_der, |reader| {
        reader.read_sequence(|reader| {
            reader.next().read_sequence(|reader| {
                let alg = reader.next().read_oid()?;
                if alg != ObjectIdentifier::from_slice(oid::SHA1) {
                    return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                }
                reader.next().read_null()
            })?;
            reader.next().read_bytes()
        })
    })?;
    let salt = yasna::parse_ber(salt_der, |reader| reader.read_bytes())?;
    let iterations = match iterations_der {
        Some(der) => yasna::parse_ber(der, |reader| reader.read_u32())?,
        None => 1,
    };
    Ok((digest, salt, iterations))
}

/// Reads a ContentInfo that must carry plain PKCS#7 `data`.
fn read_data_content_info(reader: BERReader) -> ASN1Result<Vec<u8>> {
    reader.read_sequence(|reader| {
        let content_type = reader.next().read_oid()?;
        if content_type != ObjectIdentifier::from_slice(oid::PKCS7_DATA) {
            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
        }
        reader
            .next()
            .read_tagged(Tag::context(0), |reader| reader.read_bytes())
    })
}

/// Reads a ContentInfo that is either `data` or `encryptedData`.
fn read_content_info(reader: BERReader) -> ASN1Result<ContentInfo> {
    reader.read_sequence(|reader| {
        let content_type = reader.next().read_oid()?;
        if content_type == ObjectIdentifier::from_slice(oid::PKCS7_DATA) {
            let bytes = reader
                .next()
                .read_tagged(Tag::context(0), |reader| reader.read_bytes())?;
            Ok(ContentInfo::Data(bytes))
        } else if content_type == ObjectIdentifier::from_slice(oid::PKCS7_ENCRYPTED_DATA) {
            reader.next().read_tagged(Tag::context(0), |reader| {
                reader.read_sequence(|reader| {
                    let _version = reader.next().read_u8()?;
                    reader.next().read_sequence(|reader| {
                        let inner_type = reader.next().read_oid()?;
                        if inner_type != ObjectIdentifier::from_slice(oid::PKCS7_DATA) {
                            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                        }
                        let (alg, salt, iterations) = read_pbe_algorithm(reader.next())?;
                        let ciphertext = reader
                            .next()
                            .read_tagged_implicit(Tag::context(0), |reader| reader.read_bytes())?;
                        Ok(ContentInfo::Encrypted {
                            alg,
                            salt,
                            iterations,
                            ciphertext,
                        })
                    })
                })
            })
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

/// Reads a PBES1 AlgorithmIdentifier. The OID is stashed for cipher
/// resolution after ASN.1 parsing so an unsupported algorithm surfaces as
/// [`Error::UnsupportedCipher`], not a generic parse failure.
fn read_pbe_algorithm(reader: BERReader) -> ASN1Result<(ObjectIdentifier, Vec<u8>, u32)> {
    reader.read_sequence(|reader| {
        let alg = reader.next().read_oid()?;
        let (salt, iterations) = reader.next().read_sequence(|reader| {
            let salt = reader.next().read_bytes()?;
            let iterations = reader.next().read_u32()?;
            Ok((salt, iterations))
        })?;
        Ok((alg, salt, iterations))
    })
}

/// Walks a decrypted SafeContents, collecting cert and key bags. Bag
/// attributes (friendlyName, localKeyId) are not needed on import and are
/// left unread in the raw element tail.
fn read_safe_contents(plain: &[u8], password: &str, out: &mut PfxContents) -> Result<()> {
    let bags = yasna::parse_ber(plain, |reader| {
        reader.collect_sequence_of(|reader| {
            // SafeBag ::= SEQUENCE { bagId, bagValue [0], attributes OPT }
            reader.collect_sequence_of(|reader| reader.read_der())
        })
    })?;

    for bag in bags {
        let [bag_id_der, bag_value_der, ..] = bag.as_slice() else {
            return Err(Error::Malformed("safe bag is missing its value".into()));
        };
        let bag_id = yasna::parse_ber(bag_id_der, |reader| reader.read_oid())?;
        let bag_value = yasna::parse_ber(bag_value_der, |reader| {
            reader.read_tagged(Tag::context(0), |reader| reader.read_der())
        })?;

        if bag_id == ObjectIdentifier::from_slice(oid::CERT_BAG) {
            let cert = yasna::parse_ber(&bag_value, |reader| {
                reader.read_sequence(|reader| {
                    let cert_type = reader.next().read_oid()?;
                    if cert_type != ObjectIdentifier::from_slice(oid::X509_CERTIFICATE) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    reader
                        .next()
                        .read_tagged(Tag::context(0), |reader| reader.read_bytes())
                })
            })?;
            out.certificates.push(cert);
        } else if bag_id == ObjectIdentifier::from_slice(oid::SHROUDED_KEY_BAG) {
            // EncryptedPrivateKeyInfo
            let (alg, salt, iterations, shrouded) = yasna::parse_ber(&bag_value, |reader| {
                reader.read_sequence(|reader| {
                    let (alg, salt, iterations) = read_pbe_algorithm(reader.next())?;
                    let shrouded = reader.next().read_bytes()?;
                    Ok((alg, salt, iterations, shrouded))
                })
            })?;
            let cipher = PbeCipher::from_oid(alg.components())?;
            let key = cipher.decrypt(password, &salt, iterations, &shrouded)?;
            out.private_keys.push(key);
        } else {
            return Err(Error::Malformed(format!("unsupported safe bag type {bag_id}")));
        }
    }

    Ok(())
}
