//! Payment entry point used by the per-listen and tip handlers.

use crate::error::{PaymentError, Result};
use nostr_client::{Connector, WalletConnectConfig, WalletConnection, WebSocketConnector};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

/// Asks a listener's wallet to pay a destination address.
///
/// Holds only configuration and a connector. Every call parses the
/// connection string afresh and runs its own relay session; nothing is
/// pooled or shared between calls.
#[derive(Clone)]
pub struct PaymentFacade {
    config: WalletConnectConfig,
    connector: Arc<dyn Connector>,
}

impl PaymentFacade {
    /// Facade over real WebSocket relay sessions.
    pub fn new(config: WalletConnectConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    pub fn with_connector(config: WalletConnectConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &WalletConnectConfig {
        &self.config
    }

    /// Request a `pay_to_address` of `amount` sats to `destination_address`
    /// from the wallet behind `connection_string`.
    ///
    /// Returns the wallet's decrypted reply verbatim. Failures are never
    /// turned into a reply.
    pub async fn request_payment(
        &self,
        connection_string: &str,
        destination_address: &str,
        amount: u64,
    ) -> Result<Value> {
        let connection =
            WalletConnection::from_connection_string(connection_string, self.config.clone())?;

        debug!(
            "Requesting {} sats to {} from wallet {}",
            amount,
            destination_address,
            connection.wallet_pubkey()
        );

        let reply = connection
            .pay_to_address(self.connector.as_ref(), destination_address, amount)
            .await?;
        Ok(reply)
    }

    /// Blocking form of [`PaymentFacade::request_payment`] for synchronous
    /// callers.
    ///
    /// Inside a multi-threaded tokio runtime the current worker is handed
    /// over with `block_in_place`; outside any runtime a current-thread
    /// runtime is built for the call. A current-thread runtime cannot be
    /// blocked on and yields [`PaymentError::Runtime`].
    pub fn request_payment_blocking(
        &self,
        connection_string: &str,
        destination_address: &str,
        amount: u64,
    ) -> Result<Value> {
        block_on_payment(self.request_payment(connection_string, destination_address, amount))
    }
}

impl Default for PaymentFacade {
    fn default() -> Self {
        Self::new(WalletConnectConfig::default())
    }
}

impl fmt::Debug for PaymentFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentFacade")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn block_on_payment<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(future))
        }
        Ok(_) => Err(PaymentError::Runtime(
            "cannot block inside a current-thread runtime; await request_payment instead"
                .to_string(),
        )),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| PaymentError::Runtime(e.to_string()))?;
            runtime.block_on(future)
        }
    }
}
