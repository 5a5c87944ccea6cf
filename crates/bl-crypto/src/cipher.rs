//! Authenticated symmetric encryption: AES-256-CBC + HMAC-SHA256
//! (encrypt-then-MAC), keyed by a PBKDF2-HMAC-SHA256-derived 256-bit key.
//!
//! Wire format (pre-base64): `iv (16B) || ciphertext || tag (32B)`. This
//! mirrors the source's `AESCipher`: PKCS7 padding, random IV per call,
//! HMAC computed over `iv || ciphertext`.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use bl_core::error::BlError;

use crate::constants_local::{AES_BLOCK_SIZE, HMAC_TAG_SIZE, KEY_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Derive a 256-bit key from arbitrary key material via PBKDF2-HMAC-SHA256.
pub fn derive_key(master_key_material: &[u8]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        master_key_material,
        bl_core::constants::PBKDF2_SALT,
        bl_core::constants::PBKDF2_ITERATIONS,
        &mut key,
    );
    key
}

/// Encrypt `plaintext` with `key` (must already be a 256-bit derived key).
/// Returns `iv || ciphertext || hmac_tag`.
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; AES_BLOCK_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&iv);
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(iv.len() + ciphertext.len() + tag.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);
    out
}

/// Decrypt a blob produced by [`encrypt`]. Verifies the HMAC tag in
/// constant time before attempting decryption; returns `MacMismatch` if the
/// ciphertext has been tampered with.
pub fn decrypt(key: &[u8; KEY_SIZE], blob: &[u8]) -> Result<Vec<u8>, BlError> {
    if blob.len() < AES_BLOCK_SIZE + HMAC_TAG_SIZE {
        return Err(BlError::MacMismatch);
    }
    let (iv, rest) = blob.split_at(AES_BLOCK_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - HMAC_TAG_SIZE);

    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);
    let expected_tag = mac.finalize().into_bytes();

    if expected_tag.as_slice().ct_eq(tag).unwrap_u8() != 1 {
        return Err(BlError::MacMismatch);
    }

    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| BlError::MacMismatch)
}

/// Combine two key halves: `sha256(k1 || k2)`. Used to reconstruct the
/// split master key from the RBI half and the rotating Company half.
pub fn combine_keys(k1: &[u8], k2: &[u8]) -> [u8; KEY_SIZE] {
    let mut data = Vec::with_capacity(k1.len() + k2.len());
    data.extend_from_slice(k1);
    data.extend_from_slice(k2);
    crate::hash::sha256_bytes(&data)
}
