//! Realtime channel types

use super::constants::events;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle of the realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// One record of a `payment_status` push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusRecord {
    #[serde(
        rename = "initiationTranRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub initiation_tran_ref: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl PaymentStatusRecord {
    /// Read a record leniently; anything but an object yields `None`
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let initiation_tran_ref = object
            .get("initiationTranRef")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let mut fields = object.clone();
        fields.remove("initiationTranRef");
        Some(Self {
            initiation_tran_ref,
            fields,
        })
    }
}

/// Event delivered to realtime handlers
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Namespace connection acknowledged
    Connected { sid: Option<String> },
    /// Connection lost or closed
    Disconnected { reason: String },
    /// Connection attempt failed
    ConnectError { message: String },
    /// `data` field of a `wallet_balance` message
    WalletBalance(Value),
    /// Full record list of a `payment_status` message
    PaymentStatus(Vec<Value>),
    /// An initiation reference seen for the first time
    PaymentConfirmed { initiation_tran_ref: String },
}

impl ChannelEvent {
    /// Name handlers subscribe under
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::Connected { .. } => events::CONNECT,
            ChannelEvent::Disconnected { .. } => events::DISCONNECT,
            ChannelEvent::ConnectError { .. } => events::CONNECT_ERROR,
            ChannelEvent::WalletBalance(_) => events::WALLET_BALANCE,
            ChannelEvent::PaymentStatus(_) => events::PAYMENT_STATUS,
            ChannelEvent::PaymentConfirmed { .. } => events::PAYMENT_CONFIRMED,
        }
    }
}
