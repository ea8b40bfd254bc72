//! Cryptographic utilities for the ticketing client
//!
//! This module provides the two transforms every authenticated call depends on:
//! credential hashing at login time and symmetric encryption of request and
//! response envelopes.
//!
//! # Architecture
//!
//! - [`hasher`] - Salted one-way credential hashing and the payment agency signature
//! - [`cipher`] - PBKDF2-derived AES-256-CBC envelope cipher
//!
//! # Examples
//!
//! ## Hashing credentials
//!
//! ```
//! use ticketing_core::crypto::hash_credentials;
//!
//! let token = hash_credentials("Alice", "secret");
//! assert_eq!(token, hash_credentials("alice", "secret"));
//! assert_eq!(token.primary.len(), 128);
//! ```
//!
//! ## Encrypting a payload
//!
//! ```
//! use ticketing_core::config::SecretPair;
//! use ticketing_core::crypto::PayloadCipher;
//! use serde_json::json;
//!
//! # fn example() -> ticketing_core::Result<()> {
//! let cipher = PayloadCipher::new(&SecretPair::new("pw", "sk"))?;
//! let envelope = cipher.encrypt(&json!({"username": "abc", "amount": 100}))?;
//! let value = cipher.decrypt(&envelope)?;
//! assert_eq!(value["amount"], 100);
//! # Ok(())
//! # }
//! ```
//!
//! The general API and the payment API each derive their own [`PayloadCipher`];
//! an envelope produced by one never decrypts under the other.

pub mod cipher;
pub mod hasher;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use cipher::{derive_hash_hex, CipherKey, PayloadCipher};
pub use hasher::{agency_signature, hash_credentials, CredentialToken};
