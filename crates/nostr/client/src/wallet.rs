//! Single-shot Nostr Wallet Connect exchange.
//!
//! A [`WalletConnection`] is parsed from a connection string, performs one
//! request/response exchange with the wallet service over a fresh relay
//! session, and is consumed by it:
//!
//! 1. Encrypt the request body to the wallet, sign it as a kind 23194 event.
//! 2. Publish it and subscribe to kind 23195 replies referencing it, on the
//!    same session.
//! 3. Read frames until the first `EVENT`, skipping anything else, for at
//!    most `max_attempts` frames and at most `reply_timeout`.
//! 4. Verify the reply, check it comes from the wallet, decrypt and parse it.

use crate::config::WalletConnectConfig;
use crate::error::{ClientError, WalletConnectError};
use crate::message::{ClientMessage, Filter, MessageError, RelayMessage};
use crate::transport::{Connector, RelayTransport};
use nostr::{
    Event, KeyMaterial, Nip01Error, Nip04Error, Nip47Error, SignedMessage, UnsignedMessage,
    WALLET_REQUEST_KIND, WALLET_RESPONSE_KIND, WalletConnectUri, WalletRequest,
};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

/// Subscription ids are capped at 64 characters by relays.
const SUBSCRIPTION_PREFIX: &str = "resp-";
const SUBSCRIPTION_ID_HEX_LEN: usize = 32;

/// A signed request and the frames that carry it.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub request: SignedMessage,
    pub request_id: String,
    pub subscription_id: String,
    /// `["EVENT", ...]` followed by `["REQ", ...]`
    pub frames: Vec<String>,
}

/// One Wallet Connect exchange.
pub struct WalletConnection {
    relay: String,
    lud16: Option<String>,
    wallet_pubkey: String,
    keys: KeyMaterial,
    config: WalletConnectConfig,
}

impl WalletConnection {
    /// Parse a connection string. Fails before any network activity.
    pub fn from_connection_string(
        connection_string: &str,
        config: WalletConnectConfig,
    ) -> Result<Self, WalletConnectError> {
        let uri = WalletConnectUri::parse(connection_string)?;
        Ok(Self::from_uri(uri, config))
    }

    pub fn from_uri(uri: WalletConnectUri, config: WalletConnectConfig) -> Self {
        Self {
            relay: uri.relay,
            lud16: uri.lud16,
            wallet_pubkey: uri.wallet_pubkey,
            keys: uri.secret,
            config,
        }
    }

    pub fn relay(&self) -> &str {
        &self.relay
    }

    pub fn lud16(&self) -> Option<&str> {
        self.lud16.as_deref()
    }

    pub fn wallet_pubkey(&self) -> &str {
        &self.wallet_pubkey
    }

    /// Pubkey the wallet sees requests coming from.
    pub fn client_pubkey(&self) -> String {
        self.keys.public_key_hex()
    }

    pub fn config(&self) -> &WalletConnectConfig {
        &self.config
    }

    /// Encrypt, sign and frame a request without touching the network.
    pub fn build_request(
        &self,
        request: &WalletRequest,
    ) -> Result<PreparedRequest, WalletConnectError> {
        let body = request
            .to_json()
            .map_err(|e| WalletConnectError::Protocol(format!("failed to encode request: {}", e)))?;

        let signed = UnsignedMessage::encrypted_with_kind(
            WALLET_REQUEST_KIND,
            self.wallet_pubkey.clone(),
            body,
            None,
        )
        .sign(&self.keys)
        .map_err(|e| self.build_error(e))?;

        let request_id = signed.id_hex().map_err(|e| self.build_error(e))?;
        let subscription_id = subscription_id_for(&request_id);

        let publish = ClientMessage::Event(signed.to_wire().map_err(|e| self.build_error(e))?);
        let subscribe = ClientMessage::Req {
            subscription_id: subscription_id.clone(),
            filters: vec![
                Filter::new()
                    .authors(vec![self.wallet_pubkey.clone()])
                    .kinds(vec![WALLET_RESPONSE_KIND])
                    .event_refs(vec![request_id.clone()]),
            ],
        };

        let frames = vec![
            publish.to_json().map_err(frame_error)?,
            subscribe.to_json().map_err(frame_error)?,
        ];

        Ok(PreparedRequest {
            request: signed,
            request_id,
            subscription_id,
            frames,
        })
    }

    /// Send `method` with `params` to the wallet and return its decrypted
    /// reply.
    pub async fn send(
        self,
        connector: &dyn Connector,
        method: &str,
        params: Value,
    ) -> Result<Value, WalletConnectError> {
        self.exchange(connector, WalletRequest::new(method, params))
            .await
    }

    /// Ask the wallet to pay `amount` sats to a lud16 address.
    pub async fn pay_to_address(
        self,
        connector: &dyn Connector,
        address: &str,
        amount: u64,
    ) -> Result<Value, WalletConnectError> {
        self.exchange(connector, WalletRequest::pay_to_address(address, amount))
            .await
    }

    async fn exchange(
        self,
        connector: &dyn Connector,
        request: WalletRequest,
    ) -> Result<Value, WalletConnectError> {
        let prepared = self.build_request(&request)?;

        info!(
            "Sending {} request {} to wallet {} via {}",
            request.method,
            prepared.request_id,
            self.wallet_pubkey,
            relay_host(&self.relay)
        );

        let mut transport = connector
            .connect(&self.relay, self.config.connect_timeout)
            .await?;

        let outcome = self.run(transport.as_mut(), &prepared).await;
        if timeout(
            self.config.connect_timeout,
            release(transport.as_mut(), &prepared.subscription_id),
        )
        .await
        .is_err()
        {
            debug!("Relay teardown stalled; dropping session");
        }
        drop(transport);

        match &outcome {
            Ok(_) => info!("Wallet answered request {}", prepared.request_id),
            Err(e) => warn!(
                "Request {} failed ({}): {}",
                prepared.request_id,
                e.kind(),
                e
            ),
        }

        outcome
    }

    async fn run(
        &self,
        transport: &mut dyn RelayTransport,
        prepared: &PreparedRequest,
    ) -> Result<Value, WalletConnectError> {
        match timeout(
            self.config.connect_timeout,
            transport.send(prepared.frames.clone()),
        )
        .await
        {
            Ok(sent) => sent?,
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "relay did not accept the request within {:?}",
                    self.config.connect_timeout
                ))
                .into());
            }
        }
        debug!(
            "Published request {}, subscribed as {}",
            prepared.request_id, prepared.subscription_id
        );

        let reply = match timeout(self.config.reply_timeout, self.await_reply(transport)).await {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "no reply within {:?}",
                    self.config.reply_timeout
                ))
                .into());
            }
        };

        self.resolve(reply, &prepared.request_id)
    }

    /// Read frames until the first `EVENT` or until the attempt budget runs
    /// out.
    async fn await_reply(
        &self,
        transport: &mut dyn RelayTransport,
    ) -> Result<Event, WalletConnectError> {
        let mut last_frame: Option<&'static str> = None;

        for attempt in 1..=self.config.max_attempts {
            let frame = transport.recv().await?;

            match RelayMessage::from_json(&frame) {
                Ok(RelayMessage::Event {
                    subscription_id,
                    event,
                }) => {
                    debug!(
                        "Reply event {} on {} after {} frame(s)",
                        event.id, subscription_id, attempt
                    );
                    return Ok(event);
                }
                Ok(RelayMessage::Ok {
                    event_id,
                    success: false,
                    message,
                }) => {
                    warn!("Relay rejected event {}: {}", event_id, message);
                    last_frame = Some("OK");
                }
                Ok(other) => {
                    debug!(
                        "Skipping {} frame ({}/{})",
                        other.label(),
                        attempt,
                        self.config.max_attempts
                    );
                    last_frame = Some(other.label());
                }
                Err(MessageError::UnknownType(kind)) => {
                    debug!("Skipping unknown frame type {}", kind);
                    last_frame = Some("unknown");
                }
                Err(e) => {
                    return Err(WalletConnectError::Protocol(format!(
                        "malformed relay frame: {}",
                        e
                    )));
                }
            }
        }

        Err(WalletConnectError::Protocol(match last_frame {
            Some(label) => format!(
                "no reply after {} frames; last frame was {} instead of EVENT",
                self.config.max_attempts, label
            ),
            None => "no frames read from relay".to_string(),
        }))
    }

    fn resolve(&self, event: Event, request_id: &str) -> Result<Value, WalletConnectError> {
        let reply = SignedMessage::from_wire(event).map_err(|e| match e {
            Nip01Error::IdMismatch { .. } => WalletConnectError::Verification(e.to_string()),
            other => WalletConnectError::Protocol(format!("undecodable reply envelope: {}", other)),
        })?;

        if !reply.verify() {
            return Err(WalletConnectError::Verification(
                "reply signature does not verify".to_string(),
            ));
        }

        if reply.pubkey != self.wallet_pubkey {
            return Err(WalletConnectError::Verification(format!(
                "reply authored by {} instead of wallet {}",
                reply.pubkey, self.wallet_pubkey
            )));
        }

        if !reply.event_refs().any(|id| id == request_id) {
            warn!("Reply does not reference request {}", request_id);
        }

        let cleartext = self
            .keys
            .decrypt(&reply.content, &self.wallet_pubkey)
            .map_err(|e| WalletConnectError::Decryption(e.to_string()))?;

        serde_json::from_str(&cleartext)
            .map_err(|e| WalletConnectError::Decryption(format!("reply body is not JSON: {}", e)))
    }

    fn build_error(&self, error: Nip01Error) -> WalletConnectError {
        match error {
            Nip01Error::Encryption(Nip04Error::InvalidPublicKey(_)) => {
                Nip47Error::InvalidWalletPubkey(self.wallet_pubkey.clone()).into()
            }
            other => WalletConnectError::Protocol(format!("failed to build request: {}", other)),
        }
    }
}

impl std::fmt::Debug for WalletConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConnection")
            .field("relay", &self.relay)
            .field("lud16", &self.lud16)
            .field("wallet_pubkey", &self.wallet_pubkey)
            .field("keys", &self.keys)
            .field("config", &self.config)
            .finish()
    }
}

/// Best-effort CLOSE of the reply subscription, then of the session.
async fn release(transport: &mut dyn RelayTransport, subscription_id: &str) {
    let close = ClientMessage::Close {
        subscription_id: subscription_id.to_string(),
    };
    if let Ok(frame) = close.to_json()
        && let Err(e) = transport.send(vec![frame]).await
    {
        debug!("Failed to close subscription {}: {}", subscription_id, e);
    }
    if let Err(e) = transport.close().await {
        debug!("Failed to close relay session: {}", e);
    }
}

fn subscription_id_for(request_id: &str) -> String {
    let end = request_id.len().min(SUBSCRIPTION_ID_HEX_LEN);
    format!("{}{}", SUBSCRIPTION_PREFIX, &request_id[..end])
}

fn frame_error(error: MessageError) -> WalletConnectError {
    WalletConnectError::Protocol(format!("failed to encode frame: {}", error))
}

/// Relay host for logs; the path may carry an access token.
fn relay_host(relay: &str) -> String {
    Url::parse(relay)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "relay".to_string())
}
