//! Paid/unpaid bookkeeping for payment handlers.
//!
//! Per-listen and tip handlers record an outcome rather than propagating a
//! failed payment: the reply JSON when the wallet paid, `"unpaid"` otherwise.
//! That policy lives here, on top of [`PaymentFacade::request_payment`],
//! which itself always reports failures.

use crate::error::PaymentError;
use crate::facade::PaymentFacade;
use serde_json::Value;
use tracing::{info, warn};

/// Receipt stored for a payment that did not go through.
pub const UNPAID_RECEIPT: &str = "unpaid";

/// Outcome of a payment attempt.
#[derive(Debug)]
pub enum Settlement {
    /// The wallet replied; the reply is kept verbatim
    Paid(Value),
    /// The request failed and the charge stays unpaid
    Unpaid(PaymentError),
}

impl Settlement {
    pub fn is_paid(&self) -> bool {
        matches!(self, Settlement::Paid(_))
    }

    /// String persisted alongside the listen or tip record.
    pub fn receipt(&self) -> String {
        match self {
            Settlement::Paid(reply) => reply.to_string(),
            Settlement::Unpaid(_) => UNPAID_RECEIPT.to_string(),
        }
    }

    pub fn into_result(self) -> Result<Value, PaymentError> {
        match self {
            Settlement::Paid(reply) => Ok(reply),
            Settlement::Unpaid(err) => Err(err),
        }
    }
}

impl From<Result<Value, PaymentError>> for Settlement {
    fn from(result: Result<Value, PaymentError>) -> Self {
        match result {
            Ok(reply) => Settlement::Paid(reply),
            Err(err) => Settlement::Unpaid(err),
        }
    }
}

/// Request a payment and settle on the outcome, logging failures instead of
/// returning them.
pub async fn settle_or_mark_unpaid(
    facade: &PaymentFacade,
    connection_string: &str,
    destination_address: &str,
    amount: u64,
) -> Settlement {
    let settlement: Settlement = facade
        .request_payment(connection_string, destination_address, amount)
        .await
        .into();

    match &settlement {
        Settlement::Paid(_) => info!("Paid {} sats to {}", amount, destination_address),
        Settlement::Unpaid(err) => warn!(
            "Payment of {} sats to {} marked unpaid ({}): {}",
            amount,
            destination_address,
            err.kind(),
            err
        ),
    }

    settlement
}
