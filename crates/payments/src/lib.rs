//! Per-listen and tip payments for Octopod.
//!
//! A listener links a wallet by handing over a Nostr Wallet Connect
//! connection string. [`PaymentFacade::request_payment`] asks that wallet to
//! pay a lightning address and returns the wallet's reply; failures surface
//! as [`PaymentError`]. Handlers that record a receipt instead of failing use
//! [`settle_or_mark_unpaid`].
//!
//! # Example
//!
//! ```rust,no_run
//! use octopod_payments::{PaymentFacade, WalletConnectConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), octopod_payments::PaymentError> {
//!     let facade = PaymentFacade::new(WalletConnectConfig::default());
//!     let reply = facade
//!         .request_payment("nostr+walletconnect://...", "host@example.com", 1_000)
//!         .await?;
//!     println!("paid: {}", reply);
//!     Ok(())
//! }
//! ```

mod error;
mod facade;
mod settlement;

pub use error::{PaymentError, Result};
pub use facade::PaymentFacade;
pub use settlement::{Settlement, UNPAID_RECEIPT, settle_or_mark_unpaid};

pub use nostr_client::{Connector, WalletConnectConfig, WalletConnectError};
