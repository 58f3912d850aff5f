//! Legacy PBES1 cipher engine.
//!
//! Implements the two password-based encryption schemes PKCS#12 was
//! originally specified with: `pbeWithSHAAnd40BitRC2-CBC` for certificate
//! safes and `pbeWithSHAAnd3-KeyTripleDES-CBC` for shrouded private keys.
//! Key and IV come out of the RFC 7292 KDF with purpose ids 1 and 2.

use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyIvInit};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::kdf;
use crate::oid;

/// The PBES1 ciphers supported by the legacy export pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbeCipher {
    /// RC2 in CBC mode with a 40-bit effective key (5-byte key, 8-byte IV).
    Sha1And40BitRc2Cbc,
    /// Three-key triple DES in CBC mode (24-byte key, 8-byte IV).
    Sha1And3KeyTripleDesCbc,
}

impl PbeCipher {
    /// Returns the algorithm identifier OID arcs for this cipher.
    #[must_use]
    pub const fn oid(self) -> &'static [u64] {
        match self {
            Self::Sha1And40BitRc2Cbc => oid::PBE_SHA1_40BIT_RC2_CBC,
            Self::Sha1And3KeyTripleDesCbc => oid::PBE_SHA1_3KEY_TRIPLE_DES_CBC,
        }
    }

    /// Resolves an algorithm identifier OID to a cipher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCipher`] for anything else - PBES2 or
    /// modern AES schemes are deliberately not handled here.
    pub fn from_oid(arcs: &[u64]) -> Result<Self> {
        if arcs == oid::PBE_SHA1_40BIT_RC2_CBC {
            Ok(Self::Sha1And40BitRc2Cbc)
        } else if arcs == oid::PBE_SHA1_3KEY_TRIPLE_DES_CBC {
            Ok(Self::Sha1And3KeyTripleDesCbc)
        } else {
            let dotted = arcs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            Err(Error::UnsupportedCipher(dotted))
        }
    }

    const fn key_len(self) -> usize {
        match self {
            Self::Sha1And40BitRc2Cbc => 5,
            Self::Sha1And3KeyTripleDesCbc => 24,
        }
    }

    const fn iv_len(self) -> usize {
        // Both RC2 and DES have 8-byte blocks.
        8
    }

    /// Encrypts `plaintext` under the password-derived key and IV.
    ///
    /// The plaintext is PKCS#7-padded to the cipher block size. The caller
    /// keeps the salt and iteration count; both must be encoded alongside
    /// the ciphertext so the decoder can re-derive the key.
    pub fn encrypt(
        self,
        password: &str,
        salt: &[u8],
        iterations: u32,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let pw = kdf::bmp_password(password);
        let mut key = kdf::derive(&pw, salt, kdf::ID_KEY, iterations, self.key_len());
        let mut iv = kdf::derive(&pw, salt, kdf::ID_IV, iterations, self.iv_len());

        let result = match self {
            Self::Sha1And40BitRc2Cbc => {
                let rc2 = rc2::Rc2::new_with_eff_key_len(&key, 40);
                cbc::Encryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, &iv)
                    .map_err(|e| Error::Crypto(format!("invalid RC2 IV: {e}")))
                    .map(|enc| enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
            }
            Self::Sha1And3KeyTripleDesCbc => {
                cbc::Encryptor::<des::TdesEde3>::new_from_slices(&key, &iv)
                    .map_err(|e| Error::Crypto(format!("invalid 3DES key/IV: {e}")))
                    .map(|enc| enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
            }
        };

        key.zeroize();
        iv.zeroize();
        result
    }

    /// Decrypts PBES1 ciphertext produced with the same password, salt and
    /// iteration count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] when the padding does not check out, which
    /// is the usual symptom of a wrong password.
    pub fn decrypt(
        self,
        password: &str,
        salt: &[u8],
        iterations: u32,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let pw = kdf::bmp_password(password);
        let mut key = kdf::derive(&pw, salt, kdf::ID_KEY, iterations, self.key_len());
        let mut iv = kdf::derive(&pw, salt, kdf::ID_IV, iterations, self.iv_len());

        let result = match self {
            Self::Sha1And40BitRc2Cbc => {
                let rc2 = rc2::Rc2::new_with_eff_key_len(&key, 40);
                cbc::Decryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, &iv)
                    .map_err(|e| Error::Crypto(format!("invalid RC2 IV: {e}")))
                    .and_then(|dec| {
                        dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                            .map_err(|_| Error::Crypto("bad PKCS#7 padding".into()))
                    })
            }
            Self::Sha1And3KeyTripleDesCbc => {
                cbc::Decryptor::<des::TdesEde3>::new_from_slices(&key, &iv)
                    .map_err(|e| Error::Crypto(format!("invalid 3DES key/IV: {e}")))
                    .and_then(|dec| {
                        dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                            .map_err(|_| Error::Crypto("bad PKCS#7 padding".into()))
                    })
            }
        };

        key.zeroize();
        iv.zeroize();
        result
    }
}
