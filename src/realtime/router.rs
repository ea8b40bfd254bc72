//! Inbound message dispatch
//!
//! Payloads arrive either as JSON objects or as JSON-encoded strings. A
//! payload is only acted on when its `method` field names the socket event it
//! arrived on; anything that cannot be parsed, carries an unknown method, or
//! was delivered under another event name is dropped here and never reaches
//! handlers.

use crate::correlation::PaymentCorrelationStore;
use crate::types::{events, ChannelEvent, PaymentStatusRecord};
use serde_json::{Map, Value};

/// Parse a raw socket payload into a message object
///
/// Returns `None` for empty payloads, unparseable strings and anything that
/// is not a JSON object once parsed.
pub fn parse_payload(raw: &Value) -> Option<Map<String, Value>> {
    match raw {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) if !text.is_empty() => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                tracing::warn!("Discarding socket payload that is not an object");
                None
            }
            Err(e) => {
                tracing::warn!("Failed to parse socket payload: {}", e);
                None
            }
        },
        _ => None,
    }
}

/// `data || []`
fn data_or_empty(message: &Map<String, Value>) -> Value {
    match message.get("data") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Value::Array(Vec::new()),
        Some(Value::String(s)) if s.is_empty() => Value::Array(Vec::new()),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Value::Array(Vec::new()),
        Some(value) => value.clone(),
    }
}

/// Routes parsed messages to channel events and feeds the correlation store
#[derive(Debug, Clone)]
pub struct MessageRouter {
    store: PaymentCorrelationStore,
}

impl MessageRouter {
    pub fn new(store: PaymentCorrelationStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PaymentCorrelationStore {
        &self.store
    }

    /// Turn one raw payload received as socket event `event` into the events
    /// handlers should see
    pub async fn route(&self, event: &str, raw: &Value) -> Vec<ChannelEvent> {
        let Some(message) = parse_payload(raw) else {
            return Vec::new();
        };

        let method = message.get("method").and_then(Value::as_str);
        if let Some(method) = method.filter(|m| *m != event) {
            tracing::warn!("Dropping {} event carrying method {}", event, method);
            return Vec::new();
        }

        match method {
            Some(events::WALLET_BALANCE) => {
                vec![ChannelEvent::WalletBalance(data_or_empty(&message))]
            }
            Some(events::PAYMENT_STATUS) => self.payment_status(&message).await,
            Some(other) => {
                tracing::debug!("Ignoring socket message with method {}", other);
                Vec::new()
            }
            None => {
                tracing::debug!("Ignoring socket message without a method");
                Vec::new()
            }
        }
    }

    async fn payment_status(&self, message: &Map<String, Value>) -> Vec<ChannelEvent> {
        let records = match data_or_empty(message) {
            Value::Array(records) => records,
            other => {
                tracing::warn!(
                    "payment_status data is not a list, got {}; treating as empty",
                    other
                );
                Vec::new()
            }
        };

        let mut out = Vec::new();
        for record in &records {
            let Some(reference) =
                PaymentStatusRecord::from_value(record).and_then(|r| r.initiation_tran_ref)
            else {
                continue;
            };
            if self.store.insert(&reference).await {
                tracing::info!("Payment confirmation received for {}", reference);
                out.push(ChannelEvent::PaymentConfirmed {
                    initiation_tran_ref: reference,
                });
            }
        }

        out.push(ChannelEvent::PaymentStatus(records));
        out
    }
}
