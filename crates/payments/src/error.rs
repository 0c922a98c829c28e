//! Payment error type

use nostr_client::WalletConnectError;
use thiserror::Error;

/// Why a payment request did not produce a wallet reply.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// The Wallet Connect exchange failed
    #[error(transparent)]
    Wallet(#[from] WalletConnectError),

    /// No runtime could drive a blocking request
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl PaymentError {
    /// Short stable label for logs: the wallet error kind, or `runtime`.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::Wallet(e) => e.kind(),
            PaymentError::Runtime(_) => "runtime",
        }
    }
}

/// Payment result type
pub type Result<T> = std::result::Result<T, PaymentError>;
