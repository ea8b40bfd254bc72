//! Authenticated transport client
//!
//! Every API call goes through a [`TransportClient`]. The client attaches the
//! session headers, wraps the caller's parameters together with the
//! session-derived fields into one encrypted envelope, and decrypts what comes
//! back.
//!
//! # Architecture
//!
//! - [`TransportClient`] - Request and response pipeline around a `reqwest::Client`
//! - [`TransportConfig`] - Base URL, extra-field profile, header policy, unauthorized hook
//! - [`request`] - [`ApiRequest`] builder and multipart forms
//! - [`response`] - [`ApiResponse`] and the decrypted/raw [`ResponseBody`]
//!
//! # Wire format
//!
//! - `GET`: the whole query string is replaced by `payload=<envelope>`
//! - `POST`/`PUT` with a JSON body: the body is replaced by the envelope and
//!   sent as `text/plain`
//! - `POST`/`PUT` with a multipart form: session fields are appended as
//!   plain form fields
//! - any other method is sent without an envelope
//!
//! A 401 or 403 clears the whole session, fires the configured
//! `on_unauthorized` hook and still fails the call. There is no retry here.
//!
//! # Examples
//!
//! ```no_run
//! use ticketing_core::config::{AppConfig, Environment, PaymentCredentials, SecretPair};
//! use ticketing_core::crypto::PayloadCipher;
//! use ticketing_core::session::Session;
//! use ticketing_core::transport::{ApiRequest, TransportClient, TransportConfig};
//! use serde_json::json;
//!
//! # async fn example() -> ticketing_core::Result<()> {
//! let config = AppConfig::new(
//!     Environment::Development,
//!     SecretPair::new("password", "secret-key"),
//!     PaymentCredentials::new("agency", "secret"),
//! );
//! let cipher = PayloadCipher::new(&config.api_secrets)?;
//! let client = TransportClient::new(TransportConfig::general(&config), cipher, Session::in_memory())?;
//!
//! let request = ApiRequest::get("/event/getEventCategory").with_query(&json!({"page": 0}))?;
//! let response = client.send(request).await?;
//! println!("{}", response.data());
//! # Ok(())
//! # }
//! ```

use crate::config::AppConfig;
use crate::crypto::PayloadCipher;
use crate::session::Session;
use crate::types::{headers, ExtraParamsProfile, RequestEnvelope, SessionExtras};
use crate::{ClientError, Result};
use reqwest::{header::CONTENT_TYPE, Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub mod request;
pub mod response;


pub use request::{ApiRequest, FormPart, MultipartForm, RequestBody};
pub use response::{ApiResponse, ResponseBody};

/// Type alias for the session-invalidation hook
pub type UnauthorizedFn = dyn Fn(StatusCode) + Send + Sync;

/// Type alias for the session-invalidation hook wrapped in Arc
pub type UnauthorizedFnArc = Arc<UnauthorizedFn>;

/// Statuses that end the session
pub const SESSION_ENDING_STATUSES: [StatusCode; 2] =
    [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN];

/// Transport client configuration
#[derive(Clone)]
pub struct TransportConfig {
    /// Base URL API paths are joined onto
    pub base_url: String,
    /// Request timeout
    pub timeout: Option<Duration>,
    /// How session extras are derived
    pub extras: ExtraParamsProfile,
    /// Whether the stored signing key is sent as `api-sigma-key`
    pub send_sigma_key: bool,
    /// Called after a 401/403 has cleared the session
    pub on_unauthorized: Option<UnauthorizedFnArc>,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("extras", &self.extras)
            .field("send_sigma_key", &self.send_sigma_key)
            .field("on_unauthorized", &"<function>")
            .finish()
    }
}

impl TransportConfig {
    /// Create a config with the general API defaults
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            extras: ExtraParamsProfile::general(),
            send_sigma_key: true,
            on_unauthorized: None,
        }
    }

    /// Config of the general API client
    pub fn general(config: &AppConfig) -> Self {
        let mut transport = Self::new(config.api_base_url());
        transport.timeout = config.timeout;
        transport
    }

    /// Config of the payment API client
    pub fn payment(config: &AppConfig) -> Self {
        Self::general(config)
            .with_extras(ExtraParamsProfile::payment())
            .with_sigma_key(false)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the extra-field profile
    pub fn with_extras(mut self, extras: ExtraParamsProfile) -> Self {
        self.extras = extras;
        self
    }

    /// Enable or disable the `api-sigma-key` header
    pub fn with_sigma_key(mut self, send: bool) -> Self {
        self.send_sigma_key = send;
        self
    }

    /// Set the session-invalidation hook
    pub fn with_on_unauthorized(mut self, hook: impl Fn(StatusCode) + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    /// Validate the transport configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ClientError::config("Transport base URL cannot be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::config(
                "Transport base URL must start with http:// or https://",
            ));
        }
        Ok(())
    }
}

/// Client that encrypts every request and decrypts every response
#[derive(Clone)]
pub struct TransportClient {
    base_url: String,
    client: Client,
    cipher: PayloadCipher,
    session: Session,
    extras: ExtraParamsProfile,
    send_sigma_key: bool,
    on_unauthorized: Option<UnauthorizedFnArc>,
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("base_url", &self.base_url)
            .field("send_sigma_key", &self.send_sigma_key)
            .field("on_unauthorized", &"<function>")
            .finish()
    }
}

impl TransportClient {
    /// Create a new transport client
    pub fn new(config: TransportConfig, cipher: PayloadCipher, session: Session) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| ClientError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            cipher,
            session,
            extras: config.extras,
            send_sigma_key: config.send_sigma_key,
            on_unauthorized: config.on_unauthorized,
        })
    }

    /// Base URL of this client
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cipher this client encrypts with
    pub fn cipher(&self) -> &PayloadCipher {
        &self.cipher
    }

    /// Session this client reads credentials from
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// GET with encrypted query parameters
    pub async fn get<Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> Result<ApiResponse> {
        self.send(ApiRequest::get(path).with_query(query)?).await
    }

    /// POST with an encrypted JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send(ApiRequest::post(path).with_json(body)?).await
    }

    /// PUT with an encrypted JSON body
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send(ApiRequest::put(path).with_json(body)?).await
    }

    /// POST a multipart form
    pub async fn post_form(&self, path: &str, form: MultipartForm) -> Result<ApiResponse> {
        self.send(ApiRequest::post(path).with_form(form)).await
    }

    /// Run a request through the full pipeline
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let builder = self.prepare(request).await?;

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", self.base_url, e);
            ClientError::from(e)
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if SESSION_ENDING_STATUSES.contains(&status) {
            self.invalidate_session(status).await;
            return Err(ClientError::Unauthorized { status });
        }

        let body = self.decode_body(bytes.to_vec());

        if !status.is_success() {
            let message = body.message().unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
            tracing::error!("API responded with status {}: {}", status, message);
            return Err(ClientError::Api {
                status,
                message,
                body,
            });
        }

        Ok(ApiResponse { status, body })
    }

    /// Request pipeline: headers, session extras, envelope
    async fn prepare(&self, request: ApiRequest) -> Result<RequestBuilder> {
        let ApiRequest {
            method,
            path,
            query,
            body,
            headers: extra_headers,
        } = request;

        let session = self.session.snapshot().await?;
        let url = join_url(&self.base_url, &path);
        tracing::debug!("{} {}", method, url);

        let mut builder = self.client.request(method.clone(), &url);

        if let Some(token) = &session.token {
            builder = builder.header(headers::AUTHORIZATION, token);
        }
        if self.send_sigma_key {
            if let Some(sigma) = &session.sigma_key {
                builder = builder.header(headers::SIGMA_KEY, sigma);
            }
        }
        for (name, value) in extra_headers {
            builder = builder.header(name, value);
        }

        let extras = self.extras.extras_for(session.user.as_ref());
        self.apply_payload(builder, &method, extras, query, body)
    }

    fn apply_payload(
        &self,
        mut builder: RequestBuilder,
        method: &Method,
        extras: SessionExtras,
        query: Map<String, Value>,
        body: RequestBody,
    ) -> Result<RequestBuilder> {
        if *method == Method::GET {
            let payload = RequestEnvelope::new(extras, query).into_payload()?;
            let envelope = self.cipher.encrypt(&payload)?;
            return Ok(builder.query(&[("payload", envelope)]));
        }

        if !query.is_empty() {
            builder = builder.query(&request::query_pairs(&query));
        }

        let wraps_body = *method == Method::POST || *method == Method::PUT;
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Form(form) => {
                let fields = if wraps_body {
                    extras.to_form_fields()
                } else {
                    Vec::new()
                };
                builder.multipart(form.into_reqwest(fields)?)
            }
            RequestBody::Json(map) if wraps_body => {
                let payload = RequestEnvelope::new(extras, map).into_payload()?;
                let envelope = self.cipher.encrypt(&payload)?;
                builder
                    .header(CONTENT_TYPE, headers::TEXT_PLAIN)
                    .body(envelope)
            }
            RequestBody::Json(map) => builder.json(&map),
        };

        Ok(builder)
    }

    /// Response pipeline: decrypt, falling back to the raw body
    fn decode_body(&self, bytes: Vec<u8>) -> ResponseBody {
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => return ResponseBody::Binary(e.into_bytes()),
        };

        // Envelopes served as JSON arrive quoted
        let envelope = match serde_json::from_str::<Value>(&text) {
            Ok(Value::String(inner)) => inner,
            _ => text.clone(),
        };

        match self.cipher.decrypt(&envelope) {
            Ok(value) => ResponseBody::Decrypted(value),
            Err(e) => {
                tracing::debug!("Response body is not an envelope, passing through: {}", e);
                ResponseBody::Raw(text)
            }
        }
    }

    async fn invalidate_session(&self, status: StatusCode) {
        tracing::warn!(
            "Server rejected the session with status {}; clearing session state",
            status
        );
        if let Err(e) = self.session.clear().await {
            tracing::error!("Failed to clear session state: {}", e);
        }
        if let Some(hook) = &self.on_unauthorized {
            hook(status);
        }
    }
}

/// Join a base URL and a relative path with exactly one slash between them
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
