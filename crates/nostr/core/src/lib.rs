//! Nostr protocol implementation for Octopod.
//!
//! This crate provides:
//! - Key material: BIP-340 Schnorr signing and verification over x-only keys
//! - NIP-01: Message model, canonical serialization, ids, wire envelope
//! - NIP-04: Encrypted Direct Messages
//! - NIP-47: Nostr Wallet Connect connection strings and request bodies
//!
//! Network access lives in the `nostr-client` crate; everything here is pure.

mod keys;
mod nip01;
mod nip04;
mod nip47;

// Key material
pub use keys::{KeyError, KeyMaterial};

// NIP-01: Basic protocol
pub use nip01::{
    Event, KIND_SHORT_TEXT_NOTE, Nip01Error, Payload, SignedMessage,
    UnsignedMessage, compute_id, serialize_for_id, unix_now,
};

// NIP-04: Encrypted Direct Messages
pub use nip04::{ENCRYPTED_DM_KIND, Nip04Error, decrypt, encrypt};

// NIP-47: Nostr Wallet Connect
pub use nip47::{
    CURRENCY_SAT, METHOD_PAY_TO_ADDRESS, Nip47Error, PayToAddressParams, Receiver,
    WALLET_REQUEST_KIND, WALLET_RESPONSE_KIND, WalletConnectUri, WalletRequest,
};
