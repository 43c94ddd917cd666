// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A store of the private keys the provider signs ID tokens with.
//!
//! Keys are ordered: the first one is the current signing key, the others are
//! inactive keys which are only published so that tokens signed before a key
//! rotation can still be verified.

use std::sync::Arc;

use idp_jose::{
    jwa::{JsonWebKeyUse, JsonWebSignatureAlg},
    jwk::{JsonWebKey, JsonWebKeyPublicParameters, JsonWebKeySet, PublicJsonWebKeySet, Thumbprint},
};
use pem_rfc7468::PemLabel;
use pkcs1::DecodeRsaPrivateKey;
use pkcs8::{DecodePrivateKey, EncryptedPrivateKeyInfo, PrivateKeyInfo};
use rsa::RsaPrivateKey;
use thiserror::Error;

/// Error type used when a key could not be loaded
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read PEM document")]
    Pem {
        #[from]
        inner: pem_rfc7468::Error,
    },

    #[error("Failed to decode PKCS1-encoded RSA key")]
    Pkcs1 {
        #[from]
        inner: pkcs1::Error,
    },

    #[error("Failed to decode PKCS8-encoded key")]
    Pkcs8 {
        #[from]
        inner: pkcs8::Error,
    },

    #[error("Invalid RSA private key")]
    Rsa {
        #[from]
        inner: rsa::errors::Error,
    },

    #[error("Key is encrypted and no password was provided")]
    Encrypted,

    #[error("Key is not encrypted but a password was provided")]
    Unencrypted,

    #[error("Unsupported PEM label {label:?}")]
    UnsupportedPemLabel { label: String },

    #[error("Unsupported key format")]
    UnsupportedFormat,
}

/// A single private key
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PrivateKey {
    Rsa(Box<RsaPrivateKey>),
}

impl PrivateKey {
    /// Load an unencrypted private key from either PEM or DER
    ///
    /// # Errors
    ///
    /// Returns an error if the key is encrypted, malformed or of an
    /// unsupported type
    pub fn load(bytes: &[u8]) -> Result<Self, LoadError> {
        match std::str::from_utf8(bytes) {
            Ok(pem) if pem.trim_start().starts_with("-----BEGIN") => Self::load_pem(pem),
            _ => Self::load_der(bytes),
        }
    }

    /// Load an encrypted PKCS#8 private key from either PEM or DER
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not encrypted, if the password is wrong
    /// or if the key is of an unsupported type
    pub fn load_encrypted(bytes: &[u8], password: impl AsRef<[u8]>) -> Result<Self, LoadError> {
        match std::str::from_utf8(bytes) {
            Ok(pem) if pem.trim_start().starts_with("-----BEGIN") => {
                Self::load_encrypted_pem(pem, password)
            }
            _ => Self::load_encrypted_der(bytes, password),
        }
    }

    /// Load an unencrypted private key from a PEM document
    ///
    /// Both PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) documents
    /// are supported.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, encrypted, or holds an
    /// unsupported key type
    pub fn load_pem(pem: &str) -> Result<Self, LoadError> {
        let label = pem_rfc7468::decode_label(pem.trim_start().as_bytes())?;

        let key = match label {
            pkcs1::RsaPrivateKey::PEM_LABEL => RsaPrivateKey::from_pkcs1_pem(pem)?,
            PrivateKeyInfo::PEM_LABEL => RsaPrivateKey::from_pkcs8_pem(pem)?,
            EncryptedPrivateKeyInfo::PEM_LABEL => return Err(LoadError::Encrypted),
            label => {
                return Err(LoadError::UnsupportedPemLabel {
                    label: label.to_owned(),
                });
            }
        };

        Ok(Self::from_rsa(key))
    }

    /// Load an unencrypted private key from a DER document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, encrypted, or holds an
    /// unsupported key type
    pub fn load_der(der: &[u8]) -> Result<Self, LoadError> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(Self::from_rsa(key));
        }

        if EncryptedPrivateKeyInfo::try_from(der).is_ok() {
            return Err(LoadError::Encrypted);
        }

        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(der) {
            return Ok(Self::from_rsa(key));
        }

        Err(LoadError::UnsupportedFormat)
    }

    /// Load an encrypted PKCS#8 private key from a PEM document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, not encrypted, or if the
    /// password is wrong
    pub fn load_encrypted_pem(pem: &str, password: impl AsRef<[u8]>) -> Result<Self, LoadError> {
        let label = pem_rfc7468::decode_label(pem.trim_start().as_bytes())?;

        match label {
            EncryptedPrivateKeyInfo::PEM_LABEL => {
                let key = RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password)?;
                Ok(Self::from_rsa(key))
            }
            pkcs1::RsaPrivateKey::PEM_LABEL | PrivateKeyInfo::PEM_LABEL => {
                Err(LoadError::Unencrypted)
            }
            label => Err(LoadError::UnsupportedPemLabel {
                label: label.to_owned(),
            }),
        }
    }

    /// Load an encrypted PKCS#8 private key from a DER document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, not encrypted, or if the
    /// password is wrong
    pub fn load_encrypted_der(der: &[u8], password: impl AsRef<[u8]>) -> Result<Self, LoadError> {
        if EncryptedPrivateKeyInfo::try_from(der).is_err() {
            return Err(LoadError::Unencrypted);
        }

        let key = RsaPrivateKey::from_pkcs8_encrypted_der(der, password)?;
        Ok(Self::from_rsa(key))
    }

    #[must_use]
    pub fn from_rsa(key: RsaPrivateKey) -> Self {
        Self::Rsa(Box::new(key))
    }

    /// Get the public parameters of this key, as used in a JWK
    #[must_use]
    pub fn public_params(&self) -> JsonWebKeyPublicParameters {
        match self {
            Self::Rsa(key) => key.to_public_key().into(),
        }
    }

    /// The algorithm ID tokens signed with this key use
    #[must_use]
    pub const fn signing_alg(&self) -> JsonWebSignatureAlg {
        match self {
            Self::Rsa(_) => JsonWebSignatureAlg::Rs256,
        }
    }

    /// The RFC 7638 thumbprint of the public part of the key.
    ///
    /// This is derived only from the key material, so the same key always
    /// gets the same ID.
    #[must_use]
    pub fn thumbprint(&self) -> String {
        self.public_params().thumbprint_sha256_base64()
    }
}

/// A set of signing keys, the first one being the current key
#[derive(Debug, Clone, Default)]
pub struct Keystore {
    keys: Arc<JsonWebKeySet<PrivateKey>>,
}

impl Keystore {
    /// Create a keystore out of an ordered list of private keys.
    ///
    /// Each key gets its thumbprint as key ID, and is marked for signature
    /// use.
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = PrivateKey>) -> Self {
        let keys = keys
            .into_iter()
            .map(|key| {
                let kid = key.thumbprint();
                let alg = key.signing_alg();
                JsonWebKey::new(key)
                    .with_alg(alg)
                    .with_use(JsonWebKeyUse::Sig)
                    .with_kid(kid)
            })
            .collect();

        Self {
            keys: Arc::new(keys),
        }
    }

    /// The key currently used to sign new tokens, if any
    #[must_use]
    pub fn current_signing_key(&self) -> Option<&JsonWebKey<PrivateKey>> {
        self.keys.iter().next()
    }

    /// The keys which are only kept for verifying previously signed tokens
    pub fn inactive_keys(&self) -> impl Iterator<Item = &JsonWebKey<PrivateKey>> {
        self.keys.iter().skip(1)
    }

    /// All the keys, with a flag telling whether each is the active one
    pub fn keys(&self) -> impl Iterator<Item = (&JsonWebKey<PrivateKey>, bool)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(index, key)| (key, index == 0))
    }

    /// Whether an RSA signing key is configured
    #[must_use]
    pub fn has_rsa_signing_key(&self) -> bool {
        matches!(
            self.current_signing_key().map(JsonWebKey::params),
            Some(PrivateKey::Rsa(_))
        )
    }

    /// Get the public JSON Web Key Set for the keys in this store, current key
    /// first.
    #[must_use]
    pub fn public_jwks(&self) -> PublicJsonWebKeySet {
        self.keys
            .iter()
            .map(|key| key.map(PrivateKey::public_params))
            .collect()
    }
}
