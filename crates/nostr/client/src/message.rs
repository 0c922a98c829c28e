//! Relay protocol frames (NIP-01).
//!
//! Client to relay: `EVENT`, `REQ`, `CLOSE`.
//! Relay to client: `EVENT`, `OK`, `EOSE`, `CLOSED`, `NOTICE`, `AUTH`, `COUNT`.

use nostr::Event;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur when parsing relay messages.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Well-formed frame of a type this client does not know.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field: {0}")]
    MissingField(String),
}

/// Frames sent from client to relay.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// `["EVENT", <event>]`
    Event(Event),

    /// `["REQ", <subscription_id>, <filter>...]`
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },

    /// `["CLOSE", <subscription_id>]`
    Close { subscription_id: String },
}

impl ClientMessage {
    /// Encode as a JSON array frame.
    pub fn to_json(&self) -> Result<String, MessageError> {
        let frame: Vec<Value> = match self {
            ClientMessage::Event(event) => vec!["EVENT".into(), serde_json::to_value(event)?],
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut frame = vec!["REQ".into(), subscription_id.as_str().into()];
                for filter in filters {
                    frame.push(serde_json::to_value(filter)?);
                }
                frame
            }
            ClientMessage::Close { subscription_id } => {
                vec!["CLOSE".into(), subscription_id.as_str().into()]
            }
        };
        Ok(serde_json::to_string(&frame)?)
    }
}

/// Frames sent from relay to client.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    /// `["EVENT", <subscription_id>, <event>]`
    Event {
        subscription_id: String,
        event: Event,
    },

    /// `["OK", <event_id>, <accepted>, <message>]`
    Ok {
        event_id: String,
        success: bool,
        message: String,
    },

    /// `["EOSE", <subscription_id>]`
    Eose { subscription_id: String },

    /// `["CLOSED", <subscription_id>, <message>]`
    Closed {
        subscription_id: String,
        message: String,
    },

    /// `["NOTICE", <message>]`
    Notice { message: String },

    /// `["AUTH", <challenge>]` (NIP-42)
    Auth { challenge: String },

    /// `["COUNT", <subscription_id>, {"count": <n>}]` (NIP-45)
    Count { subscription_id: String, count: u64 },
}

const KNOWN_TYPES: &[&str] = &["EVENT", "OK", "EOSE", "CLOSED", "NOTICE", "AUTH", "COUNT"];

fn text(value: &Value, field: &str) -> Result<String, MessageError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MessageError::InvalidFormat(format!("{} not a string", field)))
}

fn optional_text(rest: &[Value]) -> String {
    rest.first()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl RelayMessage {
    /// Parse a frame received from a relay.
    ///
    /// Frames of an unrecognised type yield [`MessageError::UnknownType`] so
    /// callers can skip them; anything else that does not parse is
    /// malformed.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let frame: Vec<Value> =
            serde_json::from_str(json).map_err(|e| MessageError::InvalidFormat(e.to_string()))?;

        let (msg_type, rest) = match frame.split_first() {
            Some((Value::String(msg_type), rest)) => (msg_type.as_str(), rest),
            Some(_) => {
                return Err(MessageError::InvalidFormat(
                    "first element not a string".to_string(),
                ));
            }
            None => return Err(MessageError::InvalidFormat("empty array".to_string())),
        };

        match (msg_type, rest) {
            ("EVENT", [sub, event, ..]) => Ok(RelayMessage::Event {
                subscription_id: text(sub, "subscription_id")?,
                event: serde_json::from_value(event.clone())?,
            }),
            ("OK", [event_id, Value::Bool(success), message @ ..]) => Ok(RelayMessage::Ok {
                event_id: text(event_id, "event_id")?,
                success: *success,
                message: optional_text(message),
            }),
            ("OK", [_, _, ..]) => Err(MessageError::InvalidFormat(
                "success not a boolean".to_string(),
            )),
            ("EOSE", [sub, ..]) => Ok(RelayMessage::Eose {
                subscription_id: text(sub, "subscription_id")?,
            }),
            ("CLOSED", [sub, message @ ..]) => Ok(RelayMessage::Closed {
                subscription_id: text(sub, "subscription_id")?,
                message: optional_text(message),
            }),
            ("NOTICE", [message, ..]) => Ok(RelayMessage::Notice {
                message: text(message, "message")?,
            }),
            ("AUTH", [challenge, ..]) => Ok(RelayMessage::Auth {
                challenge: text(challenge, "challenge")?,
            }),
            ("COUNT", [sub, body, ..]) => Ok(RelayMessage::Count {
                subscription_id: text(sub, "subscription_id")?,
                count: body
                    .get("count")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| MessageError::MissingField("count value".to_string()))?,
            }),
            (known, _) if KNOWN_TYPES.contains(&known) => Err(MessageError::MissingField(
                format!("{} frame has too few elements", known),
            )),
            (unknown, _) => Err(MessageError::UnknownType(unknown.to_string())),
        }
    }

    /// Frame type as it appears on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            RelayMessage::Event { .. } => "EVENT",
            RelayMessage::Ok { .. } => "OK",
            RelayMessage::Eose { .. } => "EOSE",
            RelayMessage::Closed { .. } => "CLOSED",
            RelayMessage::Notice { .. } => "NOTICE",
            RelayMessage::Auth { .. } => "AUTH",
            RelayMessage::Count { .. } => "COUNT",
        }
    }
}

/// Subscription filter.
///
/// Only the conditions a Wallet Connect reply subscription needs: author,
/// kind and tag references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    /// Tag conditions keyed `#<letter>`
    #[serde(flatten)]
    pub tags: BTreeMap<String, Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }

    pub fn kinds(mut self, kinds: Vec<u16>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Match events carrying a `letter` tag with one of `values`.
    pub fn tag(mut self, letter: char, values: Vec<String>) -> Self {
        self.tags.insert(format!("#{}", letter), values);
        self
    }

    /// Match events that reference one of `event_ids` (`#e`).
    pub fn event_refs(self, event_ids: Vec<String>) -> Self {
        self.tag('e', event_ids)
    }
}
