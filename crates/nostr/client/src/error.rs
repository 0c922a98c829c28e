//! Client error types

use nostr::Nip47Error;
use thiserror::Error;

/// Transport-level error
#[derive(Error, Debug)]
pub enum ClientError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The relay closed the connection
    #[error("Relay closed the connection")]
    Closed,
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure of a single Wallet Connect exchange.
///
/// None of these is ever turned into a successful reply.
#[derive(Error, Debug)]
pub enum WalletConnectError {
    /// Connection string missing a parameter or malformed; raised before any
    /// network activity
    #[error("connection string error: {0}")]
    ConnectionString(#[from] Nip47Error),

    /// Connect/send/receive failure, closed socket, or deadline expiry
    #[error("transport error: {0}")]
    Transport(#[from] ClientError),

    /// No reply within the attempt budget, or an undecodable frame
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Reply signature or author does not check out
    #[error("verification error: {0}")]
    Verification(String),

    /// Reply body cannot be decrypted or parsed
    #[error("decryption error: {0}")]
    Decryption(String),
}

impl WalletConnectError {
    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WalletConnectError::ConnectionString(_) => "connection_string",
            WalletConnectError::Transport(_) => "transport",
            WalletConnectError::Protocol(_) => "protocol",
            WalletConnectError::Verification(_) => "verification",
            WalletConnectError::Decryption(_) => "decryption",
        }
    }
}
