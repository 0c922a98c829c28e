//! PaymentFacade against an in-process wallet relay stub.

use async_trait::async_trait;
use nostr::{
    Event, KeyMaterial, PayToAddressParams, SignedMessage, UnsignedMessage, WALLET_RESPONSE_KIND,
};
use nostr_client::{ClientError, RelayTransport};
use octopod_payments::{
    Connector, PaymentError, PaymentFacade, Settlement, UNPAID_RECEIPT, WalletConnectConfig,
    WalletConnectError, settle_or_mark_unpaid,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

const CLIENT_SECRET: &str = "7f7ff03d123792d6ac594bfa67bf6d0c0ab55b6b1fdb6249303fe861f1ccba9a";

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init();
    });
}

#[derive(Clone, Copy)]
enum Wallet {
    /// EOSE, then a reply carrying the decoded request params
    Pays,
    /// Only ever sends EOSE
    Stalls,
    /// Replies with a signature that does not verify
    Forges,
    /// Acknowledges nothing
    Silent,
}

struct StubRelay {
    wallet: KeyMaterial,
    behavior: Wallet,
    connects: AtomicUsize,
    recv_calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl StubRelay {
    fn new(wallet: KeyMaterial, behavior: Wallet) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            behavior,
            connects: AtomicUsize::new(0),
            recv_calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn connection_string(&self) -> String {
        format!(
            "nostr+walletconnect://{}?relay=wss://relay.example&secret={}&lud16=listener@example.com",
            self.wallet.public_key_hex(),
            CLIENT_SECRET
        )
    }
}

struct StubSession {
    wallet: KeyMaterial,
    behavior: Wallet,
    queue: VecDeque<String>,
    recv_calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Connector for StubRelay {
    async fn connect(
        &self,
        relay_url: &str,
        _connect_timeout: Duration,
    ) -> nostr_client::Result<Box<dyn RelayTransport>> {
        assert_eq!(relay_url, "wss://relay.example");
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            wallet: self.wallet.clone(),
            behavior: self.behavior,
            queue: VecDeque::new(),
            recv_calls: self.recv_calls.clone(),
            requests: self.requests.clone(),
        }))
    }
}

impl StubSession {
    fn reply(&self, request: &SignedMessage, body: &Value) -> String {
        let reply = UnsignedMessage::encrypted_with_kind(
            WALLET_RESPONSE_KIND,
            request.pubkey.clone(),
            body.to_string(),
            Some(request.id_hex().unwrap()),
        )
        .sign(&self.wallet)
        .unwrap();
        json!(["EVENT", "resp", reply.to_wire().unwrap()]).to_string()
    }

    fn respond(&mut self, request: SignedMessage) {
        let body = self.wallet.decrypt(&request.content, &request.pubkey).unwrap();
        let body: Value = serde_json::from_str(&body).unwrap();
        self.requests.lock().unwrap().push(body.clone());

        let eose = json!(["EOSE", "resp"]).to_string();
        match self.behavior {
            Wallet::Pays => {
                let params: PayToAddressParams =
                    serde_json::from_value(body["params"].clone()).unwrap();
                assert_eq!(params.sending_currency_code, "SAT");
                let result = json!({
                    "result_type": "pay_to_address",
                    "result": {
                        "amount": params.sending_currency_amount,
                        "preimage": "5ee0",
                    }
                });
                let reply = self.reply(&request, &result);
                self.queue.extend([eose, reply]);
            }
            Wallet::Stalls => {
                self.queue.extend(std::iter::repeat_n(eose, 10));
            }
            Wallet::Forges => {
                let mut frame: Value =
                    serde_json::from_str(&self.reply(&request, &json!({"preimage": "x"})))
                        .unwrap();
                let sig = frame[2]["sig"].as_str().unwrap();
                let forged = format!("{}{}", &sig[64..], &sig[..64]);
                frame[2]["sig"] = Value::String(forged);
                self.queue.push_back(frame.to_string());
            }
            Wallet::Silent => {}
        }
    }
}

#[async_trait]
impl RelayTransport for StubSession {
    async fn send(&mut self, frames: Vec<String>) -> nostr_client::Result<()> {
        for frame in frames {
            let value: Value = serde_json::from_str(&frame)?;
            if value[0] == "EVENT" {
                let event: Event = serde_json::from_value(value[1].clone())?;
                let request = SignedMessage::from_wire(event).unwrap();
                self.respond(request);
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> nostr_client::Result<String> {
        self.recv_calls.fetch_add(1, Ordering::SeqCst);
        match self.queue.pop_front() {
            Some(frame) => Ok(frame),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> nostr_client::Result<()> {
        Ok(())
    }
}

fn facade(relay: &Arc<StubRelay>, config: WalletConnectConfig) -> PaymentFacade {
    init_tracing();
    PaymentFacade::with_connector(config, relay.clone())
}

#[tokio::test]
async fn test_request_payment_returns_wallet_reply() -> anyhow::Result<()> {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Pays);
    let facade = facade(&relay, WalletConnectConfig::reference());

    let reply = facade
        .request_payment(&relay.connection_string(), "host@example.com", 1_500)
        .await?;

    assert_eq!(
        reply,
        json!({
            "result_type": "pay_to_address",
            "result": {"amount": 1500, "preimage": "5ee0"}
        })
    );
    assert_eq!(
        relay.requests.lock().unwrap().as_slice(),
        &[json!({
            "method": "pay_to_address",
            "params": {
                "receiver": {"lud16": "host@example.com"},
                "sending_currency_code": "SAT",
                "sending_currency_amount": 1500,
            }
        })]
    );
    assert_eq!(relay.recv_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_each_call_uses_a_fresh_session_and_key() -> anyhow::Result<()> {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Pays);
    let facade = facade(&relay, WalletConnectConfig::reference());

    facade
        .request_payment(&relay.connection_string(), "a@example.com", 1)
        .await?;
    facade
        .clone()
        .request_payment(&relay.connection_string(), "b@example.com", 2)
        .await?;

    assert_eq!(relay.connects.load(Ordering::SeqCst), 2);
    assert_eq!(relay.requests.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_stalled_wallet_exhausts_attempts() {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Stalls);
    let facade = facade(&relay, WalletConnectConfig::reference());

    let err = facade
        .request_payment(&relay.connection_string(), "host@example.com", 10)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::Wallet(WalletConnectError::Protocol(_))
    ));
    assert_eq!(relay.recv_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_attempt_budget_is_configurable() {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Stalls);
    let facade = facade(&relay, WalletConnectConfig::reference().with_max_attempts(2));

    let err = facade
        .request_payment(&relay.connection_string(), "host@example.com", 10)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "protocol");
    assert_eq!(relay.recv_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_forged_reply_is_verification_error() {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Forges);
    let facade = facade(&relay, WalletConnectConfig::reference());

    let err = facade
        .request_payment(&relay.connection_string(), "host@example.com", 10)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "verification");
}

#[tokio::test]
async fn test_silent_wallet_hits_deadline() {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Silent);
    let config = WalletConnectConfig::reference().with_reply_timeout(Duration::from_millis(50));
    let facade = facade(&relay, config);

    let err = facade
        .request_payment(&relay.connection_string(), "host@example.com", 10)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::Wallet(WalletConnectError::Transport(ClientError::Timeout(_)))
    ));
}

#[tokio::test]
async fn test_missing_secret_fails_without_connecting() {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Pays);
    let facade = facade(&relay, WalletConnectConfig::reference());
    let connection_string = format!(
        "nostr+walletconnect://{}?relay=wss://relay.example",
        relay.wallet.public_key_hex()
    );

    let err = facade
        .request_payment(&connection_string, "host@example.com", 10)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "connection_string");
    assert_eq!(relay.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_settlement_marks_failures_unpaid() {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Forges);
    let facade = facade(&relay, WalletConnectConfig::reference());

    let settlement =
        settle_or_mark_unpaid(&facade, &relay.connection_string(), "host@example.com", 10).await;

    assert!(matches!(settlement, Settlement::Unpaid(_)));
    assert_eq!(settlement.receipt(), UNPAID_RECEIPT);
}

#[tokio::test]
async fn test_settlement_keeps_reply_as_receipt() {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Pays);
    let facade = facade(&relay, WalletConnectConfig::reference());

    let settlement =
        settle_or_mark_unpaid(&facade, &relay.connection_string(), "host@example.com", 7).await;

    assert!(settlement.is_paid());
    let receipt: Value = serde_json::from_str(&settlement.receipt()).unwrap();
    assert_eq!(receipt["result"]["amount"], 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_request_inside_multi_thread_runtime() -> anyhow::Result<()> {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Pays);
    let facade = facade(&relay, WalletConnectConfig::reference());

    let reply = facade.request_payment_blocking(&relay.connection_string(), "host@example.com", 3)?;
    assert_eq!(reply["result"]["amount"], 3);
    Ok(())
}

#[test]
fn test_blocking_request_without_runtime() -> anyhow::Result<()> {
    let relay = StubRelay::new(KeyMaterial::generate(), Wallet::Pays);
    let facade = facade(&relay, WalletConnectConfig::reference());

    let reply = facade.request_payment_blocking(&relay.connection_string(), "host@example.com", 4)?;
    assert_eq!(reply["result"]["amount"], 4);
    Ok(())
}
