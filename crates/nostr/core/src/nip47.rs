//! NIP-47: Nostr Wallet Connect.
//!
//! Vocabulary shared by every Wallet Connect exchange: event kinds, the
//! connection URI handed out by a wallet, and the JSON request bodies that get
//! encrypted into kind 23194 events.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::keys::{KeyError, KeyMaterial};

/// Client request to the wallet service.
pub const WALLET_REQUEST_KIND: u16 = 23194;
/// Wallet service response to a request.
pub const WALLET_RESPONSE_KIND: u16 = 23195;

pub const METHOD_PAY_TO_ADDRESS: &str = "pay_to_address";
pub const CURRENCY_SAT: &str = "SAT";

/// Errors that can occur when parsing a Wallet Connect URI.
#[derive(Debug, Error)]
pub enum Nip47Error {
    #[error("invalid connection uri: {0}")]
    InvalidUri(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid wallet pubkey: {0}")]
    InvalidWalletPubkey(String),

    #[error("invalid relay url: {0}")]
    InvalidRelay(String),

    #[error("invalid secret: {0}")]
    InvalidSecret(#[from] KeyError),
}

/// A parsed connection string:
/// `scheme://<wallet_pubkey>?relay=<url>&secret=<hex>&lud16=<address>`.
#[derive(Clone)]
pub struct WalletConnectUri {
    /// x-only hex pubkey of the wallet service
    pub wallet_pubkey: String,
    /// Relay the wallet service listens on
    pub relay: String,
    /// Key material derived from the `secret` parameter
    pub secret: KeyMaterial,
    /// Payment address hint
    pub lud16: Option<String>,
}

impl WalletConnectUri {
    /// Parse a connection string.
    pub fn parse(uri: &str) -> Result<Self, Nip47Error> {
        let url = Url::parse(uri).map_err(|e| Nip47Error::InvalidUri(e.to_string()))?;

        let wallet_pubkey = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(Nip47Error::MissingParameter("wallet pubkey"))?
            .to_lowercase();
        if wallet_pubkey.len() != 64 || !wallet_pubkey.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Nip47Error::InvalidWalletPubkey(wallet_pubkey));
        }

        let mut relay = None;
        let mut secret = None;
        let mut lud16 = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "relay" => relay = Some(value.into_owned()),
                "secret" => secret = Some(value.into_owned()),
                "lud16" => lud16 = Some(value.into_owned()),
                _ => {}
            }
        }

        let relay = relay
            .filter(|r| !r.is_empty())
            .ok_or(Nip47Error::MissingParameter("relay"))?;
        let relay_url = Url::parse(&relay).map_err(|e| Nip47Error::InvalidRelay(e.to_string()))?;
        if relay_url.scheme() != "ws" && relay_url.scheme() != "wss" {
            return Err(Nip47Error::InvalidRelay(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                relay_url.scheme()
            )));
        }

        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(Nip47Error::MissingParameter("secret"))?;
        let secret = KeyMaterial::from_secret_hex(&secret)?;

        Ok(Self {
            wallet_pubkey,
            relay,
            secret,
            lud16: lud16.filter(|a| !a.is_empty()),
        })
    }
}

impl fmt::Debug for WalletConnectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConnectUri")
            .field("wallet_pubkey", &self.wallet_pubkey)
            .field("relay", &self.relay)
            .field("secret", &self.secret)
            .field("lud16", &self.lud16)
            .finish()
    }
}

/// Cleartext body of a Wallet Connect request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRequest {
    pub method: String,
    pub params: Value,
}

impl WalletRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// A `pay_to_address` request for `amount` sats to a lud16 address.
    pub fn pay_to_address(address: impl Into<String>, amount: u64) -> Self {
        let address: String = address.into();
        Self::new(
            METHOD_PAY_TO_ADDRESS,
            json!({
                "receiver": { "lud16": address },
                "sending_currency_code": CURRENCY_SAT,
                "sending_currency_amount": amount,
            }),
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Params of a `pay_to_address` request, as decoded by a wallet service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayToAddressParams {
    pub receiver: Receiver,
    pub sending_currency_code: String,
    pub sending_currency_amount: u64,
}

/// Payment destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub lud16: String,
}
