//! Tests for cryptographic utilities

use super::{agency_signature, cipher, hash_credentials, PayloadCipher};
use crate::config::SecretPair;
use crate::ClientError;
use serde_json::{json, Value};

fn test_cipher() -> PayloadCipher {
    PayloadCipher::new(&SecretPair::new("pw", "sk")).unwrap()
}

#[test]
fn test_hash_credentials_known_vector() {
    let token = hash_credentials("alice", "secret");
    assert_eq!(token.intermediate, "5ebe2294ecd0e0f08eab7690d2a6ee69");
    assert_eq!(
        token.primary,
        "32aba016a2ac4a49846d16bfcf5e53d8a57e96316a17ad0053054d5a76ea3ae2e4dd2d8afb7c246e7505ae1b8ad9d3d16812b1917575b206258d809180565fdd"
    );
}

#[test]
fn test_hash_credentials_username_case_insensitive() {
    let upper = hash_credentials("Alice", "secret");
    let lower = hash_credentials("alice", "secret");
    let other_password = hash_credentials("alice", "Secret");

    assert_eq!(upper.primary, lower.primary);
    assert_ne!(lower.primary, other_password.primary);
    assert_ne!(lower.intermediate, other_password.intermediate);
}

#[test]
fn test_hash_credentials_deterministic() {
    let corpus = ["", "a", "password", "p@ss w0rd", "секрет"];
    for password in corpus {
        assert_eq!(
            hash_credentials("user", password),
            hash_credentials("user", password)
        );
    }
    for (i, a) in corpus.iter().enumerate() {
        for b in corpus.iter().skip(i + 1) {
            assert_ne!(
                hash_credentials("user", a).primary,
                hash_credentials("user", b).primary
            );
        }
    }
}

#[test]
fn test_hash_credentials_empty_inputs() {
    let token = hash_credentials("", "");
    // MD5 of the empty string
    assert_eq!(token.intermediate, "d41d8cd98f00b204e9800998ecf8427e");
    assert_eq!(token.primary.len(), 128);
}

#[test]
fn test_agency_signature_known_vector() {
    assert_eq!(
        agency_signature("agency", "secret"),
        "6d894cc7c28ce671f71365a40d3952c987b7579f3c5e79159838f5e89cdb6069fc0c43d9722efab7936586f7b192cfa19db22c826b1f3de0d142395a688df2df"
    );
}

#[test]
fn test_key_derivation_known_vector() {
    let secrets = SecretPair::new("pw", "sk");
    assert_eq!(
        cipher::derive_hash_hex(&secrets),
        "f5fcacd672c7b8b8cd23c7498569dd5423c34b248242bbac4977aa0480771a22"
    );

    let key = cipher::CipherKey::derive(&secrets).unwrap();
    assert_eq!(
        hex::encode(key.key()),
        "f5fcacd672c7b8b8cd23c7498569dd5423c34b248242bbac4977aa0480771a22"
    );
    // IV overlaps the key: first block of the same hash
    assert_eq!(hex::encode(key.iv()), "f5fcacd672c7b8b8cd23c7498569dd54");
}

#[test]
fn test_encrypt_known_vector() {
    let cipher = test_cipher();
    let envelope = cipher
        .encrypt(&json!({"username": "abc", "amount": 100}))
        .unwrap();
    assert_eq!(
        envelope,
        "asZq1/paYKVNnF1GqK3QHhxAyMr2GzR4hr5HDY32Ge2GHhdVAeAbj7/nlQrdxoTQsw9k9CRUF+srW1Zp2n/mbQ=="
    );
    assert_eq!(cipher.encrypt(&json!({})).unwrap(), "bQgRylACcO4vF7bzF5cdgw==");
}

#[test]
fn test_scenario_round_trip() {
    let cipher = test_cipher();
    let payload = json!({"username": "abc", "amount": 100});
    let envelope = cipher.encrypt(&payload).unwrap();
    let decrypted = cipher.decrypt(&envelope).unwrap();
    assert_eq!(decrypted, payload);
}

#[test]
fn test_round_trip_varied_payloads() {
    let cipher = test_cipher();
    let payloads = vec![
        json!(null),
        json!(true),
        json!(42),
        json!(-3.5),
        json!("plain string"),
        json!([1, "two", {"three": 3}]),
        json!({"nested": {"list": [1, 2, 3], "emoji": "🎟️", "accent": "café"}}),
        json!({"long": "x".repeat(1000)}),
    ];

    for payload in payloads {
        let envelope = cipher.encrypt(&payload).unwrap();
        assert_eq!(cipher.decrypt(&envelope).unwrap(), payload);
    }
}

#[test]
fn test_deterministic_ciphertext() {
    let cipher = test_cipher();
    let payload = json!({"ticket": "VIP", "qty": 2});
    assert_eq!(
        cipher.encrypt(&payload).unwrap(),
        cipher.encrypt(&payload).unwrap()
    );
}

#[test]
fn test_key_isolation() {
    let general = test_cipher();
    let payment = PayloadCipher::new(&SecretPair::new("agency", "secret")).unwrap();

    let envelope = general.encrypt(&json!({"username": "abc"})).unwrap();
    let result = payment.decrypt(&envelope);
    assert!(matches!(result, Err(ClientError::Decryption(_))));
}

#[test]
fn test_decrypt_malformed_input() {
    let cipher = test_cipher();

    assert!(matches!(
        cipher.decrypt("not base64 !!!"),
        Err(ClientError::Decryption(_))
    ));
    assert!(matches!(cipher.decrypt(""), Err(ClientError::Decryption(_))));
    // Valid base64, wrong length for a block cipher
    assert!(matches!(
        cipher.decrypt("YWJj"),
        Err(ClientError::Decryption(_))
    ));
}

#[test]
fn test_decrypt_non_json_plaintext() {
    let cipher = test_cipher();
    let envelope = cipher.encrypt_text("definitely not json");
    assert!(matches!(
        cipher.decrypt(&envelope),
        Err(ClientError::Decryption(_))
    ));
    assert_eq!(cipher.decrypt_text(&envelope).unwrap(), "definitely not json");
}

#[test]
fn test_decrypt_trims_whitespace() {
    let cipher = test_cipher();
    let envelope = cipher.encrypt_text("  {\"ok\":true}\n");
    assert_eq!(cipher.decrypt(&envelope).unwrap(), json!({"ok": true}));
}

#[test]
fn test_decrypt_as_typed() {
    #[derive(serde::Deserialize)]
    struct Purchase {
        username: String,
        amount: u64,
    }

    let cipher = test_cipher();
    let envelope = cipher
        .encrypt(&json!({"username": "abc", "amount": 100}))
        .unwrap();
    let purchase: Purchase = cipher.decrypt_as(&envelope).unwrap();
    assert_eq!(purchase.username, "abc");
    assert_eq!(purchase.amount, 100);

    let wrong_shape: crate::Result<Vec<Value>> = cipher.decrypt_as(&envelope);
    assert!(wrong_shape.is_err());
}

#[test]
fn test_empty_secrets_rejected() {
    assert!(matches!(
        PayloadCipher::new(&SecretPair::new("", "sk")),
        Err(ClientError::Config(_))
    ));
}

#[test]
fn test_debug_hides_key_material() {
    let rendered = format!("{:?}", test_cipher());
    assert!(!rendered.contains("f5fcacd6"));
}
