//! Relay transport sessions
//!
//! A transport carries text frames to and from one relay for the lifetime of
//! a single exchange. [`WebSocketConnector`] opens real WebSocket sessions;
//! tests substitute scripted relays through the same traits.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// One open session with a relay.
#[async_trait]
pub trait RelayTransport: Send {
    /// Send frames in order, back-to-back, flushing once at the end.
    async fn send(&mut self, frames: Vec<String>) -> Result<()>;

    /// Wait for the next text frame.
    ///
    /// Returns [`ClientError::Closed`] once the relay has closed the session.
    async fn recv(&mut self) -> Result<String>;

    /// Close the session.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transport sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        relay_url: &str,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RelayTransport>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens a fresh WebSocket per call; nothing is pooled.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        relay_url: &str,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RelayTransport>> {
        let transport = WebSocketTransport::connect(relay_url, connect_timeout).await?;
        Ok(Box::new(transport))
    }
}

/// WebSocket session with a single relay.
pub struct WebSocketTransport {
    url: Url,
    ws: WsStream,
}

impl WebSocketTransport {
    /// Connect to `relay_url` (ws:// or wss://) within `connect_timeout`.
    pub async fn connect(relay_url: &str, connect_timeout: Duration) -> Result<Self> {
        let url = Url::parse(relay_url)?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        if url.scheme() == "wss" {
            // Already installed by an earlier session, or by the host process
            let _ = rustls::crypto::ring::default_provider().install_default();
        }

        debug!("Connecting to relay: {}", url);

        let ws = match timeout(connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => return Err(ClientError::WebSocket(e.to_string())),
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "Connection timeout after {:?}",
                    connect_timeout
                )));
            }
        };

        info!("Connected to relay: {}", url);
        Ok(Self { url, ws })
    }
}

#[async_trait]
impl RelayTransport for WebSocketTransport {
    async fn send(&mut self, frames: Vec<String>) -> Result<()> {
        for frame in frames {
            self.ws
                .feed(Message::text(frame))
                .await
                .map_err(|e| ClientError::WebSocket(e.to_string()))?;
        }
        self.ws
            .flush()
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))
    }

    async fn recv(&mut self) -> Result<String> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_string()),
                Some(Ok(Message::Ping(data))) => {
                    // Respond to ping
                    self.ws
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| ClientError::WebSocket(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Relay {} closed connection", self.url);
                    return Err(ClientError::Closed);
                }
                Some(Ok(_)) => {} // Ignore binary and pong frames
                Some(Err(e)) => {
                    warn!("WebSocket error from {}: {}", self.url, e);
                    return Err(ClientError::WebSocket(e.to_string()));
                }
                None => return Err(ClientError::Closed),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.ws
            .close(None)
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_websocket_url() {
        let result =
            WebSocketTransport::connect("https://relay.example", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_url() {
        let result = WebSocketTransport::connect("not a url", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ClientError::UrlParse(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is closed on loopback in test environments
        let result =
            WebSocketTransport::connect("ws://127.0.0.1:9", Duration::from_secs(2)).await;
        assert!(matches!(
            result,
            Err(ClientError::WebSocket(_)) | Err(ClientError::Timeout(_))
        ));
    }
}
