//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Only the websocket transport and text frames are supported. Each websocket
//! text frame carries one Engine.IO packet; Engine.IO `message` packets carry
//! one Socket.IO packet.

use crate::{ClientError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Handshake data of the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenInfo {
    /// How long without a ping before the connection counts as dead
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ClientError::protocol("Empty Engine.IO packet"))?;
        let data = chars.as_str();

        match kind {
            '0' => {
                let info: OpenInfo = serde_json::from_str(data).map_err(|e| {
                    ClientError::protocol(format!("Invalid Engine.IO handshake: {}", e))
                })?;
                Ok(EnginePacket::Open(info))
            }
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ClientError::protocol(format!(
                "Unknown Engine.IO packet type '{}'",
                other
            ))),
        }
    }

    /// Text frame for client-originated packets
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Default namespace
pub const ROOT_NAMESPACE: &str = "/";

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        nsp: String,
        data: Option<Value>,
    },
    Disconnect {
        nsp: String,
    },
    Event {
        nsp: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        nsp: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        nsp: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// CONNECT to the root namespace
    pub fn connect() -> Self {
        SocketPacket::Connect {
            nsp: ROOT_NAMESPACE.to_string(),
            data: None,
        }
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ClientError::protocol("Empty Socket.IO packet"))?;
        let mut rest = chars.as_str();

        let nsp = if rest.starts_with('/') {
            let (nsp, tail) = match rest.find(',') {
                Some(idx) => (&rest[..idx], &rest[idx + 1..]),
                None => (rest, ""),
            };
            rest = tail;
            nsp.to_string()
        } else {
            ROOT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| ClientError::protocol(format!("Invalid Socket.IO ack id: {}", e)))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest).map_err(|e| {
                ClientError::protocol(format!("Invalid Socket.IO payload: {}", e))
            })?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { nsp, data }),
            '1' => Ok(SocketPacket::Disconnect { nsp }),
            '2' => {
                let mut args = match data {
                    Some(Value::Array(args)) => args,
                    _ => {
                        return Err(ClientError::protocol(
                            "Socket.IO event payload must be an array",
                        ))
                    }
                };
                if args.is_empty() {
                    return Err(ClientError::protocol("Socket.IO event without a name"));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    _ => return Err(ClientError::protocol("Socket.IO event name must be a string")),
                };
                Ok(SocketPacket::Event {
                    nsp,
                    id,
                    name,
                    args,
                })
            }
            '3' => {
                let id = id.ok_or_else(|| ClientError::protocol("Socket.IO ack without an id"))?;
                let args = match data {
                    Some(Value::Array(args)) => args,
                    _ => Vec::new(),
                };
                Ok(SocketPacket::Ack { nsp, id, args })
            }
            '4' => Ok(SocketPacket::ConnectError { nsp, data }),
            '5' | '6' => Err(ClientError::protocol(
                "Binary Socket.IO packets are not supported",
            )),
            other => Err(ClientError::protocol(format!(
                "Unknown Socket.IO packet type '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        let (kind, nsp) = match self {
            SocketPacket::Connect { nsp, .. } => ('0', nsp),
            SocketPacket::Disconnect { nsp } => ('1', nsp),
            SocketPacket::Event { nsp, .. } => ('2', nsp),
            SocketPacket::Ack { nsp, .. } => ('3', nsp),
            SocketPacket::ConnectError { nsp, .. } => ('4', nsp),
        };
        out.push(kind);
        if nsp != ROOT_NAMESPACE {
            out.push_str(nsp);
            out.push(',');
        }

        match self {
            SocketPacket::Connect { data, .. } | SocketPacket::ConnectError { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            SocketPacket::Disconnect { .. } => {}
            SocketPacket::Event { id, name, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                out.push_str(&Value::Array(array).to_string());
            }
            SocketPacket::Ack { id, args, .. } => {
                out.push_str(&id.to_string());
                out.push_str(&Value::Array(args.clone()).to_string());
            }
        }
        out
    }

    /// Wrap in an Engine.IO message frame
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

/// Human-readable reason out of a CONNECT_ERROR payload
pub fn connect_error_message(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(message)) => message.clone(),
        Some(value) => value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        None => "connection refused".to_string(),
    }
}
