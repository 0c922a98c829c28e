//! Nostr relay client for Octopod payments.
//!
//! This crate provides:
//! - Relay message framing (NIP-01 client and relay messages, filters)
//! - A WebSocket transport behind the [`Connector`] / [`RelayTransport`] seam
//! - The single-shot Nostr Wallet Connect exchange ([`WalletConnection`])
//!
//! # Example
//!
//! ```rust,no_run
//! use nostr_client::{WalletConnectConfig, WalletConnection, WebSocketConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = WalletConnection::from_connection_string(
//!         "nostr+walletconnect://<wallet pubkey>?relay=wss://relay.example&secret=<hex>",
//!         WalletConnectConfig::default(),
//!     )?;
//!
//!     let reply = conn
//!         .pay_to_address(&WebSocketConnector, "host@example.com", 1_000)
//!         .await?;
//!     println!("wallet replied: {}", reply);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod message;
mod transport;
mod wallet;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_REPLY_TIMEOUT, WalletConnectConfig,
};
pub use error::{ClientError, Result, WalletConnectError};
pub use message::{ClientMessage, Filter, MessageError, RelayMessage};
pub use transport::{Connector, RelayTransport, WebSocketConnector, WebSocketTransport};
pub use wallet::{PreparedRequest, WalletConnection};
