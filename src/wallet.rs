//! Wallet payments through the payment API
//!
//! Every payment call carries two authorization headers on top of the usual
//! envelope: `zelda`, the static agency signature, and `sigma`, an encrypted
//! copy of the agency credentials stamped with the current local time.

use crate::config::PaymentCredentials;
use crate::crypto::{agency_signature, PayloadCipher};
use crate::transport::{ApiRequest, ApiResponse, TransportClient};
use crate::types::{endpoints, headers};
use crate::Result;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use serde_json::json;

/// Timestamp layout inside the `sigma` header
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct SigmaBody<'a> {
    secret: &'a str,
    agency: &'a str,
    signature: &'a str,
    time: String,
}

/// Builds the per-call `sigma`/`zelda` headers
#[derive(Clone)]
pub struct PaymentAuthorization {
    credentials: PaymentCredentials,
    signature: String,
}

impl std::fmt::Debug for PaymentAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentAuthorization")
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl PaymentAuthorization {
    pub fn new(credentials: PaymentCredentials) -> Self {
        let signature = agency_signature(&credentials.agency, &credentials.secret);
        Self {
            credentials,
            signature,
        }
    }

    /// `SHA512("agency:secret")`, sent as `zelda`
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Headers for a call made now
    pub fn headers(&self, cipher: &PayloadCipher) -> Result<Vec<(String, String)>> {
        self.headers_at(cipher, Local::now().naive_local())
    }

    /// Headers for a call made at `time`
    pub fn headers_at(
        &self,
        cipher: &PayloadCipher,
        time: NaiveDateTime,
    ) -> Result<Vec<(String, String)>> {
        let body = SigmaBody {
            secret: &self.credentials.secret,
            agency: &self.credentials.agency,
            signature: &self.signature,
            time: time.format(TIME_FORMAT).to_string(),
        };
        let sigma = cipher.encrypt(&body)?;
        Ok(vec![
            (headers::PAYMENT_SIGMA.to_string(), sigma),
            (headers::PAYMENT_ZELDA.to_string(), self.signature.clone()),
        ])
    }
}

/// Wallet calls on the payment transport client
#[derive(Debug, Clone)]
pub struct WalletPayments {
    client: TransportClient,
    authorization: PaymentAuthorization,
}

impl WalletPayments {
    pub fn new(client: TransportClient, authorization: PaymentAuthorization) -> Self {
        Self {
            client,
            authorization,
        }
    }

    /// Pay from the user's wallet
    pub async fn pay<B: Serialize + ?Sized>(&self, body: &B) -> Result<ApiResponse> {
        let request = ApiRequest::post(endpoints::PAY_WITH_WALLET).with_json(body)?;
        self.send_authorized(request).await
    }

    /// Check a wallet payment by transaction id and amount
    pub async fn verify<A: Serialize>(&self, transaction_id: &str, amount: A) -> Result<ApiResponse> {
        let request = ApiRequest::get(endpoints::VERIFY_WALLET_PAYMENT).with_query(&json!({
            "transactionId": transaction_id,
            "amount": amount,
        }))?;
        self.send_authorized(request).await
    }

    async fn send_authorized(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        for (name, value) in self.authorization.headers(self.client.cipher())? {
            request = request.with_header(name, value);
        }
        self.client.send(request).await
    }
}
