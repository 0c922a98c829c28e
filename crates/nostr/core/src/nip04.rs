//! NIP-04: Encrypted Direct Messages.
//!
//! The shared key is the x-coordinate of the ECDH point between the sender's
//! secret key and the recipient's x-only public key. Content is encrypted
//! with AES-256-CBC (PKCS7) under a random 16-byte IV and encoded as
//! `base64(ciphertext) + "?iv=" + base64(iv)`.

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bitcoin::secp256k1::{Parity, PublicKey, SecretKey, XOnlyPublicKey, ecdh};
use rand::RngCore;
use thiserror::Error;

/// Kind for NIP-04 encrypted direct messages.
pub const ENCRYPTED_DM_KIND: u16 = 4;

const IV_SEPARATOR: &str = "?iv=";
const IV_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Errors that can occur during NIP-04 operations.
#[derive(Debug, Error)]
pub enum Nip04Error {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Compute the NIP-04 shared key with a peer.
fn shared_key(secret_key: &[u8; 32], peer_pubkey: &str) -> Result<[u8; 32], Nip04Error> {
    let secret =
        SecretKey::from_slice(secret_key).map_err(|e| Nip04Error::InvalidSecretKey(e.to_string()))?;

    let peer_bytes =
        hex::decode(peer_pubkey).map_err(|e| Nip04Error::InvalidPublicKey(e.to_string()))?;
    let xonly = XOnlyPublicKey::from_slice(&peer_bytes)
        .map_err(|e| Nip04Error::InvalidPublicKey(e.to_string()))?;
    let peer = PublicKey::from_x_only_public_key(xonly, Parity::Even);

    let point = ecdh::shared_secret_point(&peer, &secret);
    let mut key = [0u8; 32];
    key.copy_from_slice(&point[..32]);
    Ok(key)
}

/// Encrypt `plaintext` from the holder of `secret_key` to `peer_pubkey`.
pub fn encrypt(
    secret_key: &[u8; 32],
    peer_pubkey: &str,
    plaintext: &str,
) -> Result<String, Nip04Error> {
    let key = shared_key(secret_key, peer_pubkey)?;

    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(format!(
        "{}{}{}",
        BASE64.encode(ciphertext),
        IV_SEPARATOR,
        BASE64.encode(iv)
    ))
}

/// Decrypt a NIP-04 `payload` exchanged with `peer_pubkey`.
pub fn decrypt(
    secret_key: &[u8; 32],
    peer_pubkey: &str,
    payload: &str,
) -> Result<String, Nip04Error> {
    let (ciphertext_b64, iv_b64) = payload
        .split_once(IV_SEPARATOR)
        .ok_or_else(|| Nip04Error::InvalidPayload("missing ?iv= separator".to_string()))?;

    let ciphertext = BASE64
        .decode(ciphertext_b64)
        .map_err(|e| Nip04Error::InvalidPayload(format!("ciphertext: {}", e)))?;
    let iv: [u8; IV_LEN] = BASE64
        .decode(iv_b64)
        .map_err(|e| Nip04Error::InvalidPayload(format!("iv: {}", e)))?
        .try_into()
        .map_err(|v: Vec<u8>| {
            Nip04Error::InvalidPayload(format!("iv must be {} bytes, got {}", IV_LEN, v.len()))
        })?;

    let key = shared_key(secret_key, peer_pubkey)?;

    let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|e| Nip04Error::Decryption(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| Nip04Error::Decryption(e.to_string()))
}
