//! secp256k1 key material for signing and encrypting events.
//!
//! A [`KeyMaterial`] holds a private scalar and its x-only public key. It
//! signs 32-byte digests with BIP-340 Schnorr signatures and performs the
//! NIP-04 key agreement used for encrypted direct messages.

use std::fmt;

use bitcoin::secp256k1::{All, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey, schnorr};
use rand::RngCore;
use thiserror::Error;

use crate::nip04::{self, Nip04Error};

/// Errors that can occur when building key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid secret key length: expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// A private scalar together with its derived x-only public key.
///
/// Immutable once constructed. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct KeyMaterial {
    secp: Secp256k1<All>,
    secret: SecretKey,
    keypair: Keypair,
    public_key: XOnlyPublicKey,
}

impl KeyMaterial {
    /// Build key material from raw secret key bytes.
    pub fn from_bytes(secret_key: [u8; 32]) -> Result<Self, KeyError> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&secret_key)
            .map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
        let keypair = Keypair::from_secret_key(&secp, &secret);
        let (public_key, _parity) = keypair.x_only_public_key();
        Ok(Self {
            secp,
            secret,
            keypair,
            public_key,
        })
    }

    /// Build key material from a 64-character hex secret.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret_hex).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidLength(bytes.len()))?;
        Self::from_bytes(secret)
    }

    /// Generate fresh random key material.
    pub fn generate() -> Self {
        loop {
            let mut secret = [0u8; 32];
            rand::rng().fill_bytes(&mut secret);
            // Out-of-range scalars are astronomically rare; draw again.
            if let Ok(keys) = Self::from_bytes(secret) {
                return keys;
            }
        }
    }

    /// The x-only public key (32 bytes).
    pub fn public_key(&self) -> [u8; 32] {
        self.public_key.serialize()
    }

    /// The x-only public key as lowercase hex.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Sign a 32-byte digest with a BIP-340 Schnorr signature.
    pub fn sign(&self, digest: &[u8; 32]) -> [u8; 64] {
        let message = Message::from_digest(*digest);
        self.secp
            .sign_schnorr_no_aux_rand(&message, &self.keypair)
            .serialize()
    }

    /// Verify a BIP-340 signature against an x-only public key.
    ///
    /// Returns `false` for any malformed signature or key.
    pub fn verify(digest: &[u8; 32], signature: &[u8], pubkey: &[u8]) -> bool {
        let Ok(signature) = schnorr::Signature::from_slice(signature) else {
            return false;
        };
        let Ok(pubkey) = XOnlyPublicKey::from_slice(pubkey) else {
            return false;
        };
        let message = Message::from_digest(*digest);
        Secp256k1::verification_only()
            .verify_schnorr(&signature, &message, &pubkey)
            .is_ok()
    }

    /// Hex-encoded variant of [`KeyMaterial::verify`].
    pub fn verify_hex(digest: &[u8; 32], signature_hex: &str, pubkey_hex: &str) -> bool {
        match (hex::decode(signature_hex), hex::decode(pubkey_hex)) {
            (Ok(signature), Ok(pubkey)) => Self::verify(digest, &signature, &pubkey),
            _ => false,
        }
    }

    /// Encrypt `plaintext` for `peer_pubkey` (x-only hex) using NIP-04.
    pub fn encrypt(&self, plaintext: &str, peer_pubkey: &str) -> Result<String, Nip04Error> {
        nip04::encrypt(&self.secret.secret_bytes(), peer_pubkey, plaintext)
    }

    /// Decrypt a NIP-04 payload sent by (or to) `peer_pubkey`.
    pub fn decrypt(&self, payload: &str, peer_pubkey: &str) -> Result<String, Nip04Error> {
        nip04::decrypt(&self.secret.secret_bytes(), peer_pubkey, payload)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
