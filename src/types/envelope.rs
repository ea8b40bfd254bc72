//! Typed request envelope
//!
//! Every authenticated request carries a fixed set of session-derived fields
//! next to the caller's own fields. The envelope flattens both into a single
//! JSON object before encryption: session fields first, caller fields after,
//! with caller fields winning on a name clash.

use super::constants::client_identity;
use super::session::UserProfile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Defaults a transport client applies when deriving [`SessionExtras`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraParamsProfile {
    /// Region used when the profile has none
    pub default_region: Option<String>,
    /// Account type used when the profile has none
    pub default_account_type: Option<String>,
    /// Originating app identifier (`bizFrom`)
    pub app_identifier: Option<String>,
    /// Device type constant
    pub device_type: String,
}

impl ExtraParamsProfile {
    /// Profile of the general API client
    pub fn general() -> Self {
        Self {
            default_region: Some(client_identity::DEFAULT_REGION.to_string()),
            default_account_type: None,
            app_identifier: Some(client_identity::APP_IDENTIFIER.to_string()),
            device_type: client_identity::DEVICE_TYPE.to_string(),
        }
    }

    /// Profile of the payment API client
    pub fn payment() -> Self {
        Self {
            default_region: None,
            default_account_type: Some(client_identity::DEFAULT_PAYMENT_ACCOUNT_TYPE.to_string()),
            app_identifier: None,
            device_type: client_identity::DEVICE_TYPE.to_string(),
        }
    }

    /// Derive the extras for the current user, if any
    pub fn extras_for(&self, user: Option<&UserProfile>) -> SessionExtras {
        let region = or_default(
            user.and_then(|u| u.region.clone()),
            self.default_region.as_deref(),
        );
        let account_type = or_default(
            user.and_then(|u| u.account_type.clone()),
            self.default_account_type.as_deref(),
        );

        SessionExtras {
            username: user.and_then(|u| u.username.clone()),
            region,
            device_type: self.device_type.clone(),
            account_type,
            biz_from: self.app_identifier.clone(),
        }
    }
}

/// Empty values give way to a default; without one they are sent as `""`
fn or_default(value: Option<String>, default: Option<&str>) -> Option<String> {
    match (value, default) {
        (Some(v), Some(d)) if v.is_empty() => Some(d.to_string()),
        (None, d) => d.map(str::to_string),
        (v, _) => v,
    }
}

/// Session-derived fields injected into every request
///
/// Absent fields are omitted from the wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExtras {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "deviceType")]
    pub device_type: String,
    #[serde(rename = "accountType", skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(rename = "bizFrom", skip_serializing_if = "Option::is_none")]
    pub biz_from: Option<String>,
}

impl SessionExtras {
    /// Extras as name/value pairs, for multipart forms
    pub fn to_form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        if let Some(username) = &self.username {
            fields.push(("username".to_string(), username.clone()));
        }
        if let Some(region) = &self.region {
            fields.push(("region".to_string(), region.clone()));
        }
        fields.push(("deviceType".to_string(), self.device_type.clone()));
        if let Some(account_type) = &self.account_type {
            fields.push(("accountType".to_string(), account_type.clone()));
        }
        if let Some(biz_from) = &self.biz_from {
            fields.push(("bizFrom".to_string(), biz_from.clone()));
        }
        fields
    }
}

/// Session extras plus the caller's own fields
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub extras: SessionExtras,
    pub body: Map<String, Value>,
}

impl RequestEnvelope {
    pub fn new(extras: SessionExtras, body: Map<String, Value>) -> Self {
        Self { extras, body }
    }

    /// Flatten into the single JSON object that gets encrypted
    pub fn into_payload(self) -> crate::Result<Value> {
        let mut merged = match serde_json::to_value(&self.extras)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in self.body {
            merged.insert(key, value);
        }
        Ok(Value::Object(merged))
    }
}
