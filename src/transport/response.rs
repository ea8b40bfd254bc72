//! Decoded API responses

use crate::{ClientError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Response body after the decryption attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body was an envelope and decrypted to JSON
    Decrypted(Value),
    /// Body was text that did not decrypt; passed through unchanged
    Raw(String),
    /// Body was not text at all (files, images)
    Binary(Vec<u8>),
}

impl ResponseBody {
    /// JSON view of the body, parsing raw text if needed
    pub fn to_value(&self) -> Option<Value> {
        match self {
            ResponseBody::Decrypted(value) => Some(value.clone()),
            ResponseBody::Raw(text) => serde_json::from_str(text).ok(),
            ResponseBody::Binary(_) => None,
        }
    }

    /// Server-provided `message` field, if the body has one
    pub fn message(&self) -> Option<String> {
        self.to_value()?
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn is_decrypted(&self) -> bool {
        matches!(self, ResponseBody::Decrypted(_))
    }
}

/// Successful API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Deserialize the body into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.body {
            ResponseBody::Decrypted(value) => Ok(serde_json::from_value(value.clone())?),
            ResponseBody::Raw(text) => Ok(serde_json::from_str(text)?),
            ResponseBody::Binary(bytes) => Err(ClientError::invalid_request(format!(
                "Binary response of {} bytes is not JSON",
                bytes.len()
            ))),
        }
    }

    /// Body as JSON, or `Value::Null` when it is not JSON
    pub fn value(&self) -> Value {
        self.body.to_value().unwrap_or(Value::Null)
    }

    /// The `data` field most endpoints wrap their result in
    pub fn data(&self) -> Value {
        self.value().get("data").cloned().unwrap_or(Value::Null)
    }
}
