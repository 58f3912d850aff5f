//! RFC 7292 Appendix B.2 password-based key derivation.
//!
//! PKCS#12 does not use PBKDF2. Its original KDF diversifies SHA-1 output
//! by a one-byte purpose id and mixes the password and salt through a
//! block-wise big-endian addition. Modern crypto libraries no longer ship
//! it, but every legacy `.p12` consumer (RADIUS supplicants, OS trust
//! stores) still expects keys derived exactly this way.

use sha1::{Digest, Sha1};

/// SHA-1 output size in bytes (`u` in RFC 7292 terms).
const U: usize = 20;
/// SHA-1 block size in bytes (`v` in RFC 7292 terms).
const V: usize = 64;

/// Purpose id for encryption key material.
pub const ID_KEY: u8 = 1;
/// Purpose id for initialization vectors.
pub const ID_IV: u8 = 2;
/// Purpose id for MAC key material.
pub const ID_MAC: u8 = 3;

/// Encodes a password the way PKCS#12 expects: UTF-16BE code units
/// followed by a two-byte NUL terminator.
///
/// The empty password still produces the two terminator bytes, matching
/// what OpenSSL and NSS feed into the KDF.
#[must_use]
pub fn bmp_password(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() * 2 + 2);
    for unit in password.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out.extend_from_slice(&[0, 0]);
    out
}

/// Derives `n` bytes of key material per RFC 7292 Appendix B.2.
///
/// `password` must already be in the UTF-16BE NUL-terminated form produced
/// by [`bmp_password`]. `id` selects the purpose ([`ID_KEY`], [`ID_IV`] or
/// [`ID_MAC`]); the same password and salt yield unrelated streams for
/// different ids.
#[must_use]
pub fn derive(password: &[u8], salt: &[u8], id: u8, iterations: u32, n: usize) -> Vec<u8> {
    // D: v bytes of the purpose id.
    let diversifier = [id; V];

    // S and P: salt and password repeated to a multiple of v bytes, then
    // concatenated into I.
    let mut mix = expand_to_block_multiple(salt);
    mix.extend(expand_to_block_multiple(password));

    let rounds = n.div_ceil(U);
    let mut out = Vec::with_capacity(rounds * U);

    for _ in 0..rounds {
        // A = SHA1^iterations(D || I)
        let mut hasher = Sha1::new();
        hasher.update(diversifier);
        hasher.update(&mix);
        let mut block: [u8; U] = hasher.finalize().into();
        for _ in 1..iterations {
            block = Sha1::digest(block).into();
        }
        out.extend_from_slice(&block);

        // B: A repeated to v bytes, then I := (I_j + B + 1) per v-byte
        // block, big-endian with carry across the whole block.
        let mut addend = [0u8; V];
        for (i, byte) in addend.iter_mut().enumerate() {
            *byte = block[i % U];
        }
        for chunk in mix.chunks_mut(V) {
            let mut carry = 1u16;
            for (target, add) in chunk.iter_mut().zip(addend.iter()).rev() {
                let sum = u16::from(*target) + u16::from(*add) + carry;
                *target = sum as u8;
                carry = sum >> 8;
            }
        }
    }

    out.truncate(n);
    out
}

/// Repeats `data` to fill a whole number of `V`-byte blocks. Empty input
/// stays empty, as required for the empty-salt and empty-password cases.
fn expand_to_block_multiple(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(V) * V;
    data.iter().copied().cycle().take(len).collect()
}
