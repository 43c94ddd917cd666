// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use idp_jose::jwk::Thumbprint;
use idp_keystore::{Keystore, LoadError, PrivateKey};

static PKCS1_PEM: &str = include_str!("./keys/rsa.pkcs1.pem");
static PKCS8_PEM: &str = include_str!("./keys/rsa.pkcs8.pem");
static PKCS8_ENCRYPTED_PEM: &str = include_str!("./keys/rsa.pkcs8.encrypted.pem");
static PASSWORD: &str = "hunter2";

static PKCS1_KID: &str = "lO6BzrqSQnIEZodQqALNM2zQ7o6Ds4kkr4GQ-QN8Trg";
static PKCS8_KID: &str = "rYt93Bw_0czIvtRDjL2I5Rj5GMQTSa13XfESjwK7XxM";

#[test]
fn load_pem_keys() {
    let key = PrivateKey::load_pem(PKCS1_PEM).unwrap();
    assert_eq!(key.thumbprint(), PKCS1_KID);

    let key = PrivateKey::load(PKCS8_PEM.as_bytes()).unwrap();
    assert_eq!(key.thumbprint(), PKCS8_KID);
}

#[test]
fn load_der_keys() {
    let (_label, der) = pem_rfc7468::decode_vec(PKCS8_PEM.as_bytes()).unwrap();
    let key = PrivateKey::load(&der).unwrap();
    assert_eq!(key.thumbprint(), PKCS8_KID);

    let (_label, der) = pem_rfc7468::decode_vec(PKCS1_PEM.as_bytes()).unwrap();
    let key = PrivateKey::load_der(&der).unwrap();
    assert_eq!(key.thumbprint(), PKCS1_KID);
}

#[test]
fn load_encrypted_keys() {
    let key = PrivateKey::load_encrypted(PKCS8_ENCRYPTED_PEM.as_bytes(), PASSWORD).unwrap();
    assert_eq!(key.thumbprint(), PKCS8_KID);

    // Loading an encrypted key without a password fails
    assert!(matches!(
        PrivateKey::load(PKCS8_ENCRYPTED_PEM.as_bytes()),
        Err(LoadError::Encrypted)
    ));

    // And giving a password for an unencrypted key fails too
    assert!(matches!(
        PrivateKey::load_encrypted(PKCS8_PEM.as_bytes(), PASSWORD),
        Err(LoadError::Unencrypted)
    ));

    assert!(PrivateKey::load_encrypted(PKCS8_ENCRYPTED_PEM.as_bytes(), "wrong").is_err());
}

#[test]
fn reject_garbage() {
    assert!(PrivateKey::load(b"not a key").is_err());

    let certificate = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
    assert!(matches!(
        PrivateKey::load_pem(certificate),
        Err(LoadError::UnsupportedPemLabel { .. })
    ));
}

#[test]
fn thumbprint_is_stable() {
    let first = PrivateKey::load_pem(PKCS1_PEM).unwrap();
    let second = PrivateKey::load_pem(PKCS1_PEM).unwrap();
    assert_eq!(first.thumbprint(), second.thumbprint());
    assert_eq!(
        first.public_params().thumbprint_sha256(),
        second.public_params().thumbprint_sha256()
    );
}

#[test]
fn empty_keystore() {
    let keystore = Keystore::default();
    assert!(!keystore.has_rsa_signing_key());
    assert!(keystore.current_signing_key().is_none());
    assert!(keystore.public_jwks().is_empty());
}

#[test]
fn public_jwks_keeps_order() {
    let keystore = Keystore::new([
        PrivateKey::load_pem(PKCS8_PEM).unwrap(),
        PrivateKey::load_pem(PKCS1_PEM).unwrap(),
    ]);

    assert!(keystore.has_rsa_signing_key());
    assert_eq!(
        keystore.current_signing_key().and_then(|key| key.kid()),
        Some(PKCS8_KID)
    );

    let inactive: Vec<_> = keystore.inactive_keys().filter_map(|k| k.kid()).collect();
    assert_eq!(inactive, vec![PKCS1_KID]);

    let active: Vec<_> = keystore.keys().map(|(_, active)| active).collect();
    assert_eq!(active, vec![true, false]);

    let jwks = keystore.public_jwks();
    let kids: Vec<_> = jwks.iter().filter_map(|key| key.kid()).collect();
    assert_eq!(kids, vec![PKCS8_KID, PKCS1_KID]);

    let json = serde_json::to_value(&jwks).unwrap();
    let first = &json["keys"][0];
    assert_eq!(first["alg"], "RS256");
    assert_eq!(first["use"], "sig");
    assert_eq!(first["kty"], "RSA");
    assert_eq!(first["e"], "AQAB");
    assert_eq!(
        first["n"],
        "285qGvSnPrxASYAI_c4B4ijrD0A7lG4cAJuwYxhSwMrZ9dUKsNHh6FhQFr_nWYkSC_dqtWVZco8WKdR9dUIw8y08qiZAovTDkuY6-uqeLs7AWCgNmIFjvdoykt2yTqaxO2mtTXun3frp7Dl5BblSVU7kjX-D4sYs0qZ3i4O5QJU"
    );
    // No private parameters leak out
    assert!(first.get("d").is_none());
}
