//! # Ticketing Core
//!
//! Client-side core of the SmartDeals event-ticketing platform: credential
//! hashing, the encrypted request envelope every API call travels in, the
//! authenticated transport built around it, and the realtime channel that
//! confirms wallet payments.
//!
//! ## Features
//!
//! - **Credential hashing**: `SHA512(lowercase(username):MD5(password))` for login
//! - **Envelope cipher**: PBKDF2-derived AES-256-CBC, wire compatible with the existing API
//! - **Authenticated transport**: session headers, typed envelopes, forced logout on 401/403
//! - **Realtime channel**: Socket.IO connection feeding a payment correlation store
//! - **Payment watcher**: cancellable polling for asynchronous payment confirmations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ticketing_core::{session::Session, TicketingCore, WatchOutcome};
//! use tokio_util::sync::CancellationToken;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ticketing_core::Result<()> {
//!     let core = TicketingCore::from_config(
//!         ticketing_core::config::AppConfig::from_env()?,
//!         Session::in_memory(),
//!     )?;
//!     core.start().await?;
//!
//!     core.auth().login("alice", "secret").await?;
//!     core.wallet()
//!         .pay(&json!({"amount": 5000, "initiationTranRef": "REF-1"}))
//!         .await?;
//!
//!     match core.watcher().wait_for("REF-1", CancellationToken::new()).await {
//!         WatchOutcome::Confirmed { .. } => println!("paid"),
//!         other => println!("not confirmed: {:?}", other),
//!     }
//!
//!     core.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`config`**: Environment presets, secret pairs, env-driven loading
//! - **`crypto`**: Credential hasher and payload cipher
//! - **`session`**: Session storage backends and the typed session handle
//! - **`transport`**: Encrypting/decrypting HTTP client
//! - **`auth`**: Login, signing-key retrieval, logout
//! - **`wallet`**: Payment API calls with agency authorization headers
//! - **`realtime`**: Socket.IO channel and message routing
//! - **`correlation`**: Set of confirmed payment references
//! - **`watcher`**: Polling consumer of the correlation store
//! - **`types`**: Wire types and constants
//! - **`error`**: Error taxonomy

pub mod auth;
pub mod config;
pub mod correlation;
pub mod crypto;
pub mod error;
pub mod realtime;
pub mod session;
pub mod transport;
pub mod types;
pub mod wallet;
pub mod watcher;

// Re-exports for convenience
pub use auth::AuthService;
pub use config::{AppConfig, Environment, PaymentCredentials, SecretPair};
pub use correlation::PaymentCorrelationStore;
pub use crypto::{hash_credentials, PayloadCipher};
pub use error::{ClientError, Result};
pub use realtime::{RealtimeChannel, RealtimeConfig};
pub use session::Session;
pub use transport::{ApiRequest, ApiResponse, TransportClient, TransportConfig};
pub use wallet::{PaymentAuthorization, WalletPayments};
pub use watcher::{PaymentWatcher, WatchOutcome};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide client, constructed once at startup
///
/// Owns the session, both transport clients (each with its own cipher) and
/// the single realtime channel.
#[derive(Debug, Clone)]
pub struct TicketingCore {
    config: AppConfig,
    session: Session,
    api: TransportClient,
    payments: TransportClient,
    auth: AuthService,
    wallet: WalletPayments,
    realtime: RealtimeChannel,
}

impl TicketingCore {
    pub fn from_config(config: AppConfig, session: Session) -> Result<Self> {
        config.validate()?;

        let api = TransportClient::new(
            TransportConfig::general(&config),
            PayloadCipher::new(&config.api_secrets)?,
            session.clone(),
        )?;
        let payments = TransportClient::new(
            TransportConfig::payment(&config),
            PayloadCipher::new(&config.payment.secret_pair())?,
            session.clone(),
        )?;

        let auth = AuthService::new(api.clone());
        let wallet = WalletPayments::new(
            payments.clone(),
            PaymentAuthorization::new(config.payment.clone()),
        );
        let realtime = RealtimeChannel::new(
            RealtimeConfig::from_app(&config),
            PaymentCorrelationStore::new(),
        );

        Ok(Self {
            config,
            session,
            api,
            payments,
            auth,
            wallet,
            realtime,
        })
    }

    /// Build from `APP_*` environment variables with an in-memory session
    pub fn from_env() -> Result<Self> {
        Self::from_config(AppConfig::from_env()?, Session::in_memory())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// General API client
    pub fn api(&self) -> &TransportClient {
        &self.api
    }

    /// Payment API client
    pub fn payments(&self) -> &TransportClient {
        &self.payments
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn wallet(&self) -> &WalletPayments {
        &self.wallet
    }

    pub fn realtime(&self) -> &RealtimeChannel {
        &self.realtime
    }

    pub fn correlations(&self) -> &PaymentCorrelationStore {
        self.realtime.correlations()
    }

    /// Watcher over this client's correlation store
    pub fn watcher(&self) -> PaymentWatcher {
        PaymentWatcher::new(self.correlations().clone())
    }

    /// Open the realtime channel
    pub async fn start(&self) -> Result<()> {
        self.realtime.connect().await
    }

    /// Close the realtime channel and release its handlers
    pub async fn shutdown(&self) {
        self.realtime.disconnect().await;
    }
}
