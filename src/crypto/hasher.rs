//! Credential hashing
//!
//! Passwords never leave the client in clear text. The login endpoint and the
//! signing-key endpoint both expect `SHA512(lowercase(username) + ":" + MD5(password))`
//! rendered as lowercase hex.

use md5::Md5;
use sha2::{Digest, Sha512};

/// Hashed form of a username/password pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialToken {
    /// `SHA512(lowercase(username):intermediate)`, sent as the password field
    pub primary: String,
    /// `MD5(password)`
    pub intermediate: String,
}

/// Hash a username/password pair into the transport credential token
///
/// Deterministic: there is no per-call salt. Empty inputs are hashed as-is;
/// callers validate credentials before calling.
pub fn hash_credentials(username: &str, password: &str) -> CredentialToken {
    let intermediate = hex::encode(Md5::digest(password.as_bytes()));
    let combined = format!("{}:{}", username.to_lowercase(), intermediate);
    let primary = hex::encode(Sha512::digest(combined.as_bytes()));

    CredentialToken {
        primary,
        intermediate,
    }
}

/// Static signature the payment API expects in the `zelda` header
pub fn agency_signature(agency: &str, secret: &str) -> String {
    let input = format!("{}:{}", agency, secret);
    hex::encode(Sha512::digest(input.as_bytes()))
}
