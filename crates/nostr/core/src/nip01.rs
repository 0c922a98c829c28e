//! NIP-01: Basic protocol flow description.
//!
//! This module implements the Nostr message model used by Octopod:
//! - The wire envelope (id, pubkey, created_at, kind, tags, content, sig)
//! - Canonical serialization and id computation
//! - Unsigned messages, with plain or NIP-04 encrypted payloads
//! - Signed messages, whose id is recomputed from their fields on demand
//!
//! A message only gains an id once it is signed. [`UnsignedMessage`] has no
//! id accessor at all; encrypting the body of a direct message happens inside
//! [`UnsignedMessage::sign`], right before the id is computed.

use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::hashes::{Hash, sha256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::KeyMaterial;
use crate::nip04::{ENCRYPTED_DM_KIND, Nip04Error};

/// Errors that can occur during NIP-01 operations.
#[derive(Debug, Error)]
pub enum Nip01Error {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("event id mismatch: envelope claims {claimed}, content hashes to {computed}")]
    IdMismatch { claimed: String, computed: String },

    #[error("encryption error: {0}")]
    Encryption(#[from] Nip04Error),
}

/// Standard event kinds
pub const KIND_SHORT_TEXT_NOTE: u16 = 1;

/// A signed Nostr event as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-bytes lowercase hex-encoded sha256 of the serialized event data
    pub id: String,
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind (integer between 0 and 65535)
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// 64-bytes lowercase hex signature
    pub sig: String,
}

/// Serialize message fields for hashing.
///
/// Format: `[0, pubkey, created_at, kind, tags, content]`, compact JSON with
/// non-ASCII characters left unescaped.
pub fn serialize_for_id(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<String, Nip01Error> {
    serde_json::to_string(&(0, pubkey, created_at, kind, tags, content))
        .map_err(|e| Nip01Error::Serialization(e.to_string()))
}

/// Compute a message id from its fields.
pub fn compute_id(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<[u8; 32], Nip01Error> {
    let serialized = serialize_for_id(pubkey, created_at, kind, tags, content)?;
    Ok(sha256::Hash::hash(serialized.as_bytes()).to_byte_array())
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Body of an unsigned message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Content is signed as-is.
    Plain(String),
    /// NIP-04 direct message; `cleartext` is encrypted to `recipient` at
    /// signing time.
    EncryptedDirect {
        recipient: String,
        cleartext: String,
        reference: Option<String>,
    },
}

/// A message that has not been signed yet and therefore has no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedMessage {
    pubkey: Option<String>,
    created_at: u64,
    kind: u16,
    tags: Vec<Vec<String>>,
    payload: Payload,
}

impl UnsignedMessage {
    /// Create a plain message with the given kind and content.
    pub fn new(kind: u16, content: impl Into<String>) -> Self {
        Self {
            pubkey: None,
            created_at: unix_now(),
            kind,
            tags: Vec::new(),
            payload: Payload::Plain(content.into()),
        }
    }

    /// Create a NIP-04 encrypted direct message (kind 4).
    pub fn encrypted_direct(
        recipient: impl Into<String>,
        cleartext: impl Into<String>,
        reference: Option<String>,
    ) -> Self {
        Self::encrypted_with_kind(ENCRYPTED_DM_KIND, recipient, cleartext, reference)
    }

    /// Create an encrypted direct message under a protocol-specific kind.
    ///
    /// The tags hold exactly one `p` tag for the recipient and, when
    /// `reference` is set, exactly one `e` tag for it.
    pub fn encrypted_with_kind(
        kind: u16,
        recipient: impl Into<String>,
        cleartext: impl Into<String>,
        reference: Option<String>,
    ) -> Self {
        let recipient = recipient.into();
        let mut tags = vec![vec!["p".to_string(), recipient.clone()]];
        if let Some(event_id) = &reference {
            tags.push(vec!["e".to_string(), event_id.clone()]);
        }
        Self {
            pubkey: None,
            created_at: unix_now(),
            kind,
            tags,
            payload: Payload::EncryptedDirect {
                recipient,
                cleartext: cleartext.into(),
                reference,
            },
        }
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the author explicitly instead of deriving it from the signing key.
    pub fn with_pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey = Some(pubkey.into());
        self
    }

    /// Append a tag.
    ///
    /// Encrypted direct messages own their `p` and `e` tags; adding another
    /// one is rejected.
    pub fn with_tag(mut self, tag: Vec<String>) -> Result<Self, Nip01Error> {
        if let Payload::EncryptedDirect { .. } = self.payload
            && matches!(tag.first().map(String::as_str), Some("p") | Some("e"))
        {
            return Err(Nip01Error::InvalidEvent(
                "encrypted direct messages carry a single recipient and reference tag".to_string(),
            ));
        }
        self.tags.push(tag);
        Ok(self)
    }

    pub fn kind(&self) -> u16 {
        self.kind
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn tags(&self) -> &[Vec<String>] {
        &self.tags
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Resolve the payload into the content that gets signed.
    fn finalize_body(&self, key: &KeyMaterial) -> Result<String, Nip01Error> {
        match &self.payload {
            Payload::Plain(content) => Ok(content.clone()),
            Payload::EncryptedDirect {
                recipient,
                cleartext,
                ..
            } => Ok(key.encrypt(cleartext, recipient)?),
        }
    }

    /// Finalize the body, compute the id and attach a signature.
    pub fn sign(self, key: &KeyMaterial) -> Result<SignedMessage, Nip01Error> {
        let content = self.finalize_body(key)?;
        let pubkey = self.pubkey.unwrap_or_else(|| key.public_key_hex());

        let id = compute_id(&pubkey, self.created_at, self.kind, &self.tags, &content)?;
        let sig = hex::encode(key.sign(&id));

        Ok(SignedMessage {
            pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content,
            sig,
        })
    }
}

/// A message with an attached signature.
///
/// The id is never stored: [`SignedMessage::id`] hashes the current field
/// values, so editing any field after signing makes [`SignedMessage::verify`]
/// fail while the old signature stays attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl SignedMessage {
    /// The message id, recomputed from the current fields.
    pub fn id(&self) -> Result<[u8; 32], Nip01Error> {
        compute_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// The message id as lowercase hex.
    pub fn id_hex(&self) -> Result<String, Nip01Error> {
        Ok(hex::encode(self.id()?))
    }

    /// Verify the signature against the recomputed id and the author key.
    pub fn verify(&self) -> bool {
        match self.id() {
            Ok(id) => KeyMaterial::verify_hex(&id, &self.sig, &self.pubkey),
            Err(_) => false,
        }
    }

    /// Values of all `p` tags.
    pub fn pubkey_refs(&self) -> impl Iterator<Item = &str> {
        self.tag_values("p")
    }

    /// Values of all `e` tags.
    pub fn event_refs(&self) -> impl Iterator<Item = &str> {
        self.tag_values("e")
    }

    fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }

    /// Encode into the wire envelope.
    pub fn to_wire(&self) -> Result<Event, Nip01Error> {
        Ok(Event {
            id: self.id_hex()?,
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
            sig: self.sig.clone(),
        })
    }

    /// Encode the wire envelope as a JSON object string.
    pub fn to_json(&self) -> Result<String, Nip01Error> {
        serde_json::to_string(&self.to_wire()?).map_err(|e| Nip01Error::Serialization(e.to_string()))
    }

    /// Decode a wire envelope.
    ///
    /// Rejects malformed hex fields and envelopes whose `id` does not match
    /// their content. Signature validity is checked separately by
    /// [`SignedMessage::verify`].
    pub fn from_wire(event: Event) -> Result<Self, Nip01Error> {
        if !is_lower_hex(&event.pubkey, 64) {
            return Err(Nip01Error::InvalidHex(format!(
                "pubkey must be 64 lowercase hex characters: {}",
                event.pubkey
            )));
        }
        if !is_lower_hex(&event.id, 64) {
            return Err(Nip01Error::InvalidHex(format!(
                "id must be 64 lowercase hex characters: {}",
                event.id
            )));
        }
        if !is_lower_hex(&event.sig, 128) {
            return Err(Nip01Error::InvalidHex(
                "sig must be 128 lowercase hex characters".to_string(),
            ));
        }

        let message = Self {
            pubkey: event.pubkey,
            created_at: event.created_at,
            kind: event.kind,
            tags: event.tags,
            content: event.content,
            sig: event.sig,
        };

        let computed = message.id_hex()?;
        if computed != event.id {
            return Err(Nip01Error::IdMismatch {
                claimed: event.id,
                computed,
            });
        }

        Ok(message)
    }

    /// Decode a wire envelope from a JSON object string.
    pub fn from_json(json: &str) -> Result<Self, Nip01Error> {
        let event: Event =
            serde_json::from_str(json).map_err(|e| Nip01Error::InvalidEvent(e.to_string()))?;
        Self::from_wire(event)
    }
}
