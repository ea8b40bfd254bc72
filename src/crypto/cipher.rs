//! Payload cipher shared with the API server
//!
//! The wire format is fixed by the server:
//!
//! 1. `hash = hex(PBKDF2-HMAC-SHA1(password, UTF16LE(secret_key), 1000 rounds, 32 bytes))`
//! 2. `key = hex_decode(hash[..64])`, `iv = hex_decode(hash[..42])`
//! 3. JSON text is re-encoded as UTF-16LE, encrypted with AES-256-CBC/PKCS7
//! 4. ciphertext is rendered as standard base64 with no salt header
//!
//! The IV is 21 bytes after hex decoding; CBC only reads the first block, so
//! the effective IV is the first 16 bytes of the key. There is no per-message
//! nonce: equal plaintexts under one secret pair produce equal ciphertexts.

use crate::config::SecretPair;
use crate::{ClientError, Result};
use aes::Aes256;
use base64::{engine::general_purpose, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha1::Sha1;
use std::fmt;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 1000;
/// Derived key length in bytes
pub const DERIVED_KEY_LEN: usize = 32;
/// Hex characters of the derived hash taken as the key
pub const KEY_HEX_LEN: usize = 64;
/// Hex characters of the derived hash taken as the IV
pub const IV_HEX_LEN: usize = 42;
/// AES block (and effective IV) size
pub const BLOCK_SIZE: usize = 16;

/// Key material derived from a [`SecretPair`]
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey {
    key: [u8; DERIVED_KEY_LEN],
    iv: [u8; BLOCK_SIZE],
}

impl CipherKey {
    /// Run the key derivation for a secret pair
    pub fn derive(secrets: &SecretPair) -> Result<Self> {
        let hash = derive_hash_hex(secrets);

        let key_bytes = hex::decode(&hash[..KEY_HEX_LEN])
            .map_err(|e| ClientError::config(format!("Invalid derived key: {}", e)))?;
        let iv_bytes = hex::decode(&hash[..IV_HEX_LEN])
            .map_err(|e| ClientError::config(format!("Invalid derived IV: {}", e)))?;

        let mut key = [0u8; DERIVED_KEY_LEN];
        key.copy_from_slice(&key_bytes);
        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&iv_bytes[..BLOCK_SIZE]);

        Ok(Self { key, iv })
    }

    pub fn key(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(<redacted>)")
    }
}

/// Hex-encoded PBKDF2 output for a secret pair
///
/// Deriving a longer output only appends blocks, so the first 64 hex chars are
/// the same whatever length the server-side implementation requests.
pub fn derive_hash_hex(secrets: &SecretPair) -> String {
    let salt = utf16le_bytes(&secrets.secret_key);
    let mut derived = [0u8; DERIVED_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha1>(
        secrets.password.as_bytes(),
        &salt,
        PBKDF2_ITERATIONS,
        &mut derived,
    );
    hex::encode(derived)
}

/// Symmetric cipher for request and response envelopes
#[derive(Clone)]
pub struct PayloadCipher {
    key: CipherKey,
}

impl fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadCipher")
            .field("key", &self.key)
            .finish()
    }
}

impl PayloadCipher {
    /// Derive the cipher for a secret pair
    pub fn new(secrets: &SecretPair) -> Result<Self> {
        secrets.validate("Cipher")?;
        Ok(Self {
            key: CipherKey::derive(secrets)?,
        })
    }

    /// Encrypt the JSON form of `payload` into an envelope string
    pub fn encrypt<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        let text = serde_json::to_string(payload)
            .map_err(|e| ClientError::encryption(format!("Payload is not serializable: {}", e)))?;
        Ok(self.encrypt_text(&text))
    }

    /// Encrypt already-serialized JSON text
    pub fn encrypt_text(&self, text: &str) -> String {
        let plaintext = utf16le_bytes(text);
        let ciphertext = Aes256CbcEnc::new(&self.key.key.into(), &self.key.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);
        general_purpose::STANDARD.encode(ciphertext)
    }

    /// Decrypt an envelope string back into JSON
    pub fn decrypt(&self, ciphertext: &str) -> Result<Value> {
        let text = self.decrypt_text(ciphertext)?;
        serde_json::from_str(text.trim())
            .map_err(|e| ClientError::decryption(format!("Decrypted payload is not JSON: {}", e)))
    }

    /// Decrypt an envelope string into a typed value
    pub fn decrypt_as<T: DeserializeOwned>(&self, ciphertext: &str) -> Result<T> {
        let value = self.decrypt(ciphertext)?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::decryption(format!("Unexpected payload shape: {}", e)))
    }

    /// Decrypt an envelope string into its UTF-16LE decoded text
    pub fn decrypt_text(&self, ciphertext: &str) -> Result<String> {
        let raw = general_purpose::STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| ClientError::decryption(format!("Invalid base64: {}", e)))?;
        if raw.is_empty() || raw.len() % BLOCK_SIZE != 0 {
            return Err(ClientError::decryption(format!(
                "Ciphertext length {} is not a positive multiple of the block size",
                raw.len()
            )));
        }

        let plaintext = Aes256CbcDec::new(&self.key.key.into(), &self.key.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&raw)
            .map_err(|_| ClientError::decryption("Invalid padding"))?;

        utf16le_string(&plaintext)
    }
}

/// UTF-16LE code units of `text`
pub(crate) fn utf16le_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn utf16le_string(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(ClientError::decryption(
            "Plaintext has an odd number of bytes for UTF-16LE",
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| ClientError::decryption(format!("Invalid UTF-16: {}", e)))
}
