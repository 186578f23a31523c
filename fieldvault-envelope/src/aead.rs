//! AEAD: AES-GCM with detached tags.
//!
//! AES-128-GCM seals field values; AES-256-GCM is used only for wrapping
//! private keys under the master secret. Both use 96-bit nonces and 128-bit tags.

use aes_gcm::{
    aead::{
        consts::{U12, U16},
        generic_array::GenericArray,
        AeadInPlace, KeyInit,
    },
    Aes128Gcm, Aes256Gcm,
};
use getrandom::getrandom;
use zeroize::Zeroizing;

use crate::error::{DecryptionError, EncodingError};

pub const NONCE_BYTES: usize = 12;
pub const TAG_BYTES: usize = 16;
pub const AES128_KEY_BYTES: usize = 16;
pub const AES256_KEY_BYTES: usize = 32;

/// Output of a detached seal: the three parts are stored separately by callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_BYTES],
    pub tag: [u8; TAG_BYTES],
    pub ciphertext: Vec<u8>,
}

/// Generate a random 12-byte nonce. Used during encryption only.
pub fn nonce() -> Result<[u8; NONCE_BYTES], EncodingError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|_| EncodingError)?;
    Ok(n)
}

/// Generate a fresh random AES-128 key (ephemeral data key).
pub fn generate_key128() -> Result<Zeroizing<[u8; AES128_KEY_BYTES]>, EncodingError> {
    let mut k = Zeroizing::new([0u8; AES128_KEY_BYTES]);
    getrandom(k.as_mut()).map_err(|_| EncodingError)?;
    Ok(k)
}

/// AES-128-GCM seal under a fresh random nonce.
pub fn seal_aes128(
    key: &[u8; AES128_KEY_BYTES],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Sealed, EncodingError> {
    seal_with::<Aes128Gcm>(key, plaintext, aad)
}

/// AES-128-GCM open. Returns DecryptionError on any failure.
pub fn open_aes128(
    key: &[u8; AES128_KEY_BYTES],
    nonce: &[u8; NONCE_BYTES],
    tag: &[u8; TAG_BYTES],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    open_with::<Aes128Gcm>(key, nonce, tag, ciphertext, aad)
}

/// AES-256-GCM seal under a fresh random nonce.
pub fn seal_aes256(
    key: &[u8; AES256_KEY_BYTES],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Sealed, EncodingError> {
    seal_with::<Aes256Gcm>(key, plaintext, aad)
}

/// AES-256-GCM open. Returns DecryptionError on any failure.
pub fn open_aes256(
    key: &[u8; AES256_KEY_BYTES],
    nonce: &[u8; NONCE_BYTES],
    tag: &[u8; TAG_BYTES],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    open_with::<Aes256Gcm>(key, nonce, tag, ciphertext, aad)
}

fn seal_with<C>(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Sealed, EncodingError>
where
    C: KeyInit + AeadInPlace<NonceSize = U12, TagSize = U16>,
{
    let cipher = C::new_from_slice(key).map_err(|_| EncodingError)?;
    let nonce = nonce()?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), aad, &mut buffer)
        .map_err(|_| EncodingError)?;

    let mut tag_bytes = [0u8; TAG_BYTES];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Sealed {
        nonce,
        tag: tag_bytes,
        ciphertext: buffer,
    })
}

fn open_with<C>(
    key: &[u8],
    nonce: &[u8; NONCE_BYTES],
    tag: &[u8; TAG_BYTES],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DecryptionError>
where
    C: KeyInit + AeadInPlace<NonceSize = U12, TagSize = U16>,
{
    let cipher = C::new_from_slice(key).map_err(|_| DecryptionError)?;
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            aad,
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| DecryptionError)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = generate_key128().unwrap();
        let sealed = seal_aes128(&key, b"salary:4200000", b"").unwrap();
        assert_eq!(sealed.ciphertext.len(), 14);

        let pt = open_aes128(&key, &sealed.nonce, &sealed.tag, &sealed.ciphertext, b"").unwrap();
        assert_eq!(pt, b"salary:4200000");
    }

    #[test]
    fn wrong_tag_fails() {
        let key = generate_key128().unwrap();
        let mut sealed = seal_aes128(&key, b"data", b"").unwrap();
        sealed.tag[0] ^= 0x01;
        let result = open_aes128(&key, &sealed.nonce, &sealed.tag, &sealed.ciphertext, b"");
        assert_eq!(result, Err(DecryptionError));
    }

    #[test]
    fn wrong_aad_fails() {
        let key = [7u8; AES256_KEY_BYTES];
        let sealed = seal_aes256(&key, b"data", b"good").unwrap();
        let result = open_aes256(&key, &sealed.nonce, &sealed.tag, &sealed.ciphertext, b"bad");
        assert_eq!(result, Err(DecryptionError));
    }

    #[test]
    fn nonces_are_fresh() {
        let key = generate_key128().unwrap();
        let a = seal_aes128(&key, b"same", b"").unwrap();
        let b = seal_aes128(&key, b"same", b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn ephemeral_keys_differ() {
        let a = generate_key128().unwrap();
        let b = generate_key128().unwrap();
        assert_ne!(*a, *b);
    }
}
