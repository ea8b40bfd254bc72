//! Environment-specific configuration
//!
//! A development/production switch selects the preset hosts and which secret
//! pairs are read from the environment. Secrets are required: a missing or
//! empty secret fails at startup instead of surfacing later as an opaque
//! decryption failure.

use crate::{ClientError, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Production API host
pub const PRODUCTION_API_HOST: &str = "https://core.smartdeals.com.ng";
/// Production realtime host
pub const PRODUCTION_SOCKET_HOST: &str = "https://socket.smartdeals.com.ng";
/// Staging API host
pub const DEVELOPMENT_API_HOST: &str = "https://core-staging.smartdeals.com.ng";
/// Staging realtime host
pub const DEVELOPMENT_SOCKET_HOST: &str = "https://socket-staging.smartdeals.com.ng";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Preset API host for this environment
    pub fn api_host(&self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_API_HOST,
            Environment::Production => PRODUCTION_API_HOST,
        }
    }

    /// Preset realtime host for this environment
    pub fn socket_host(&self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_SOCKET_HOST,
            Environment::Production => PRODUCTION_SOCKET_HOST,
        }
    }

    fn var_suffix(&self) -> &'static str {
        match self {
            Environment::Development => "_DEV",
            Environment::Production => "",
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    /// Only `development` selects the staging setup
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("development") {
            Environment::Development
        } else {
            Environment::Production
        })
    }
}

/// Two shared secrets from which a cipher key is derived
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPair {
    /// PBKDF2 password
    pub password: String,
    /// PBKDF2 salt, encoded as UTF-16LE before use
    pub secret_key: String,
}

impl SecretPair {
    pub fn new(password: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Both halves must be present
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.password.is_empty() {
            return Err(ClientError::config(format!("{} password cannot be empty", name)));
        }
        if self.secret_key.is_empty() {
            return Err(ClientError::config(format!(
                "{} secret key cannot be empty",
                name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SecretPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPair")
            .field("password", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Agency credentials for the payment API
///
/// The agency doubles as the payment cipher password and the secret as its
/// salt; the same pair signs the `zelda` authorization header.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentCredentials {
    pub agency: String,
    pub secret: String,
}

impl PaymentCredentials {
    pub fn new(agency: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            agency: agency.into(),
            secret: secret.into(),
        }
    }

    /// Secret pair used by the payment cipher
    pub fn secret_pair(&self) -> SecretPair {
        SecretPair::new(self.agency.clone(), self.secret.clone())
    }
}

impl fmt::Debug for PaymentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCredentials")
            .field("agency", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    /// Host serving the REST API (without the `/api` suffix)
    pub api_host: String,
    /// Host serving the realtime channel
    pub socket_host: String,
    /// Secret pair for the general API cipher
    pub api_secrets: SecretPair,
    /// Credentials for the payment API cipher and signature
    pub payment: PaymentCredentials,
    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl AppConfig {
    /// Create a config with the preset hosts of `environment`
    pub fn new(
        environment: Environment,
        api_secrets: SecretPair,
        payment: PaymentCredentials,
    ) -> Self {
        Self {
            environment,
            api_host: environment.api_host().to_string(),
            socket_host: environment.socket_host().to_string(),
            api_secrets,
            payment,
            timeout: None,
        }
    }

    /// Load configuration from `APP_*` environment variables
    pub fn from_env() -> Result<Self> {
        let environment = env::var("APP_ENVIRONMENT")
            .ok()
            .and_then(|v| v.parse::<Environment>().ok())
            .unwrap_or_default();
        let suffix = environment.var_suffix();

        let api_secrets = SecretPair::new(
            required_var(&format!("APP_ENCRYPTION_PASSWORD{}", suffix))?,
            required_var(&format!("APP_ENCRYPTION_SECRETKEY{}", suffix))?,
        );
        let payment = PaymentCredentials::new(
            required_var(&format!("APP_AGENCY{}", suffix))?,
            required_var(&format!("APP_SECRET{}", suffix))?,
        );

        let mut config = Self::new(environment, api_secrets, payment);

        if let Ok(host) = env::var("APP_API_HOST") {
            config = config.with_api_host(host);
        }
        if let Ok(host) = env::var("APP_SOCKET_HOST") {
            config = config.with_socket_host(host);
        }
        if let Ok(secs) = env::var("APP_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                ClientError::config(format!("APP_HTTP_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        tracing::debug!(
            "Loaded {:?} configuration for {}",
            config.environment,
            config.api_host
        );
        Ok(config)
    }

    /// Override the API host
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = host.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the realtime host
    pub fn with_socket_host(mut self, host: impl Into<String>) -> Self {
        self.socket_host = host.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Base URL every API path is joined onto
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.api_host)
    }

    /// Validate hosts and secrets
    pub fn validate(&self) -> Result<()> {
        for (name, host) in [("API host", &self.api_host), ("Socket host", &self.socket_host)] {
            if host.is_empty() {
                return Err(ClientError::config(format!("{} cannot be empty", name)));
            }
            if !host.starts_with("http://") && !host.starts_with("https://") {
                return Err(ClientError::config(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        self.api_secrets.validate("API encryption")?;
        self.payment.secret_pair().validate("Payment")?;
        Ok(())
    }
}

fn required_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ClientError::config(format!(
            "Required environment variable {} is not set",
            name
        ))),
    }
}
