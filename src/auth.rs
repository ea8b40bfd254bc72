//! Login flow
//!
//! Logging in is two calls through the general transport client: `/login_web`
//! with the hashed credentials, which returns the user profile and access
//! token, then `/customer/fpk` for the per-session signing key that later
//! requests carry as `api-sigma-key`.

use crate::crypto::hash_credentials;
use crate::transport::TransportClient;
use crate::types::{client_identity, endpoints, UserProfile};
use crate::{ClientError, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "bizFrom")]
    biz_from: &'a str,
    #[serde(rename = "deviceType")]
    device_type: &'a str,
    region: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct SigmaKeyRequest<'a> {
    #[serde(flatten)]
    login: LoginRequest<'a>,
    #[serde(rename = "accountType", skip_serializing_if = "Option::is_none")]
    account_type: Option<&'a str>,
}

/// Login and logout against the general API
#[derive(Debug, Clone)]
pub struct AuthService {
    client: TransportClient,
}

impl AuthService {
    pub fn new(client: TransportClient) -> Self {
        Self { client }
    }

    /// Log in and populate the session
    ///
    /// On success the session holds the user profile, the access token, the
    /// refresh token when the server sent one, and the signing key.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile> {
        let credentials = hash_credentials(username, password);
        let request = LoginRequest {
            username,
            password: &credentials.primary,
            biz_from: client_identity::APP_IDENTIFIER,
            device_type: client_identity::DEVICE_TYPE,
            region: client_identity::DEFAULT_REGION,
        };

        tracing::debug!("Logging in as {}", username);
        let response = self.client.post(endpoints::LOGIN, &request).await?;

        let data = response.data();
        if !data.is_object() {
            return Err(ClientError::protocol("Login response carries no user data"));
        }
        let mut user: UserProfile = serde_json::from_value(data)?;
        if user.username.is_none() {
            user.username = Some(username.to_string());
        }
        let token = user
            .access_token
            .clone()
            .ok_or_else(|| ClientError::protocol("Login response carries no access token"))?;

        let session = self.client.session();
        session.set_user(&user).await?;
        session.set_token(&token).await?;
        if let Some(refresh_token) = &user.refresh_token {
            session.set_refresh_token(refresh_token).await?;
        }

        let sigma_key = self
            .fetch_sigma_key(request, user.account_type.as_deref())
            .await?;
        session.set_sigma_key(&sigma_key).await?;

        tracing::info!("Logged in as {}", username);
        Ok(user)
    }

    async fn fetch_sigma_key(
        &self,
        login: LoginRequest<'_>,
        account_type: Option<&str>,
    ) -> Result<String> {
        let request = SigmaKeyRequest {
            login,
            account_type,
        };
        let response = self.client.get(endpoints::SIGMA_KEY, &request).await?;

        let body = response.value();
        body.get("private_key")
            .or_else(|| body.get("data").and_then(|d| d.get("private_key")))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::protocol("Signing key response carries no private_key"))
    }

    /// Drop all session state
    pub async fn logout(&self) -> Result<()> {
        self.client.session().clear().await?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Profile of the logged-in user, if any
    pub async fn current_user(&self) -> Result<Option<UserProfile>> {
        self.client.session().user().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretPair;
    use crate::crypto::PayloadCipher;
    use crate::session::Session;
    use crate::transport::TransportConfig;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn cipher() -> PayloadCipher {
        PayloadCipher::new(&SecretPair::new("pw", "sk")).unwrap()
    }

    fn service(url: String, session: Session) -> AuthService {
        let client = TransportClient::new(TransportConfig::new(url), cipher(), session).unwrap();
        AuthService::new(client)
    }

    #[tokio::test]
    async fn test_login_populates_session() {
        let mut server = Server::new_async().await;
        let cipher = cipher();
        let hashed = hash_credentials("Alice", "secret").primary;

        let login_body = cipher
            .encrypt(&json!({
                "region": "NG",
                "deviceType": "web",
                "bizFrom": "SMARTDEALS",
                "username": "Alice",
                "password": hashed
            }))
            .unwrap();
        let login = server
            .mock("POST", "/api/login_web")
            .match_body(Matcher::Exact(login_body))
            .with_status(200)
            .with_body(
                cipher
                    .encrypt(&json!({
                        "message": "Login successful",
                        "data": {
                            "username": "alice",
                            "accountType": "member",
                            "accessToken": "tok-1",
                            "refreshToken": "ref-1",
                            "firstName": "Alice"
                        }
                    }))
                    .unwrap(),
            )
            .create_async()
            .await;

        let sigma_query = cipher
            .encrypt(&json!({
                "username": "Alice",
                "region": "NG",
                "deviceType": "web",
                "accountType": "member",
                "bizFrom": "SMARTDEALS",
                "password": hashed
            }))
            .unwrap();
        let sigma = server
            .mock("GET", "/api/customer/fpk")
            .match_query(Matcher::UrlEncoded("payload".into(), sigma_query))
            .match_header("authorization", "tok-1")
            .with_status(200)
            .with_body(cipher.encrypt(&json!({"private_key": "sigma-xyz"})).unwrap())
            .create_async()
            .await;

        let session = Session::in_memory();
        let auth = service(format!("{}/api", server.url()), session.clone());
        let user = auth.login("Alice", "secret").await.unwrap();

        login.assert_async().await;
        sigma.assert_async().await;

        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.extra["firstName"], "Alice");

        let state = session.snapshot().await.unwrap();
        assert!(state.is_authenticated());
        assert_eq!(state.token.as_deref(), Some("tok-1"));
        assert_eq!(state.refresh_token.as_deref(), Some("ref-1"));
        assert_eq!(state.sigma_key.as_deref(), Some("sigma-xyz"));
        assert_eq!(auth.current_user().await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_session_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/login_web")
            .with_status(400)
            .with_body(
                cipher()
                    .encrypt(&json!({"message": "Invalid username or password"}))
                    .unwrap(),
            )
            .create_async()
            .await;

        let session = Session::in_memory();
        let auth = service(format!("{}/api", server.url()), session.clone());
        let err = auth.login("alice", "wrong").await.unwrap_err();

        match err {
            ClientError::Api { message, .. } => assert_eq!(message, "Invalid username or password"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(session.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_without_token_is_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/login_web")
            .with_status(200)
            .with_body(cipher().encrypt(&json!({"data": {"username": "alice"}})).unwrap())
            .create_async()
            .await;

        let auth = service(format!("{}/api", server.url()), Session::in_memory());
        let err = auth.login("alice", "secret").await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_missing_signing_key_fails_login() {
        let mut server = Server::new_async().await;
        let cipher = cipher();
        let _login = server
            .mock("POST", "/api/login_web")
            .with_status(200)
            .with_body(
                cipher
                    .encrypt(&json!({"data": {"username": "alice", "accessToken": "tok-1"}}))
                    .unwrap(),
            )
            .create_async()
            .await;
        let _sigma = server
            .mock("GET", "/api/customer/fpk")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(cipher.encrypt(&json!({"status": true})).unwrap())
            .create_async()
            .await;

        let session = Session::in_memory();
        let auth = service(format!("{}/api", server.url()), session.clone());
        let err = auth.login("alice", "secret").await.unwrap_err();

        assert!(err.to_string().contains("private_key"));
        assert_eq!(session.sigma_key().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let session = Session::in_memory();
        session.set_token("tok-1").await.unwrap();
        session.set_sigma_key("sigma-1").await.unwrap();

        let auth = service("http://127.0.0.1:9/api".into(), session.clone());
        auth.logout().await.unwrap();

        assert!(session.snapshot().await.unwrap().is_empty());
        assert_eq!(auth.current_user().await.unwrap(), None);
    }
}
