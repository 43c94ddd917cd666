// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::borrow::Cow;

use anyhow::{Context, bail};
use camino::Utf8PathBuf;
use futures_util::future::{try_join, try_join_all};
use idp_keystore::{Keystore, PrivateKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{ConfigurationSection, util::error_on_field};

fn example_secret() -> &'static str {
    "0000111122223333444455556666777788889999aaaabbbbccccddddeeeeffff"
}

/// Password config option.
///
/// It either holds the password value directly or references a file where the
/// password is stored.
#[derive(Clone, Debug)]
pub enum Password {
    File(Utf8PathBuf),
    Value(String),
}

/// Password fields as serialized in JSON.
#[derive(JsonSchema, Serialize, Deserialize, Clone, Debug)]
struct PasswordRaw {
    #[schemars(with = "Option<String>")]
    password_file: Option<Utf8PathBuf>,
    password: Option<String>,
}

impl TryFrom<PasswordRaw> for Option<Password> {
    type Error = anyhow::Error;

    fn try_from(value: PasswordRaw) -> Result<Self, Self::Error> {
        match (value.password, value.password_file) {
            (None, None) => Ok(None),
            (None, Some(path)) => Ok(Some(Password::File(path))),
            (Some(password), None) => Ok(Some(Password::Value(password))),
            (Some(_), Some(_)) => bail!("Cannot specify both `password` and `password_file`"),
        }
    }
}

impl From<Option<Password>> for PasswordRaw {
    fn from(value: Option<Password>) -> Self {
        let (password, password_file) = match value {
            Some(Password::File(path)) => (None, Some(path)),
            Some(Password::Value(password)) => (Some(password), None),
            None => (None, None),
        };

        PasswordRaw {
            password_file,
            password,
        }
    }
}

/// Key config option.
///
/// It either holds the PEM document directly or references a file where the
/// key is stored.
#[derive(Clone, Debug)]
pub enum Key {
    File(Utf8PathBuf),
    Value(String),
}

/// Key fields as serialized in JSON.
#[derive(JsonSchema, Serialize, Deserialize, Clone, Debug)]
struct KeyRaw {
    #[schemars(with = "Option<String>")]
    key_file: Option<Utf8PathBuf>,
    key: Option<String>,
}

impl TryFrom<KeyRaw> for Key {
    type Error = anyhow::Error;

    fn try_from(value: KeyRaw) -> Result<Key, Self::Error> {
        match (value.key, value.key_file) {
            (None, None) => bail!("Missing `key` or `key_file`"),
            (None, Some(path)) => Ok(Key::File(path)),
            (Some(key), None) => Ok(Key::Value(key)),
            (Some(_), Some(_)) => bail!("Cannot specify both `key` and `key_file`"),
        }
    }
}

impl From<Key> for KeyRaw {
    fn from(value: Key) -> Self {
        match value {
            Key::File(path) => KeyRaw {
                key_file: Some(path),
                key: None,
            },
            Key::Value(key) => KeyRaw {
                key_file: None,
                key: Some(key),
            },
        }
    }
}

/// A single RSA signing key, with an optional password.
///
/// The key ID published for it is its RFC 7638 thumbprint.
#[serde_as]
#[derive(JsonSchema, Serialize, Deserialize, Clone, Debug)]
pub struct KeyConfig {
    #[schemars(with = "PasswordRaw")]
    #[serde_as(as = "serde_with::TryFromInto<PasswordRaw>")]
    #[serde(flatten)]
    password: Option<Password>,

    #[schemars(with = "KeyRaw")]
    #[serde_as(as = "serde_with::TryFromInto<KeyRaw>")]
    #[serde(flatten)]
    key: Key,
}

impl KeyConfig {
    /// Create a key config out of an inline PEM document
    #[must_use]
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self {
            password: None,
            key: Key::Value(pem.into()),
        }
    }

    /// Returns the password in case any is provided.
    ///
    /// If `password_file` was given, the password is read from that file.
    async fn password(&self) -> anyhow::Result<Option<Cow<'_, String>>> {
        Ok(match &self.password {
            Some(Password::File(path)) => Some(Cow::Owned(
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read password file {path}"))?,
            )),
            Some(Password::Value(password)) => Some(Cow::Borrowed(password)),
            None => None,
        })
    }

    /// Returns the key.
    ///
    /// If `key_file` was given, the key is read from that file.
    async fn key(&self) -> anyhow::Result<Cow<'_, String>> {
        Ok(match &self.key {
            Key::File(path) => Cow::Owned(
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read key file {path}"))?,
            ),
            Key::Value(key) => Cow::Borrowed(key),
        })
    }

    /// Load the private key described by this config.
    ///
    /// Password and/or key are read from file if they're given as path.
    async fn private_key(&self) -> anyhow::Result<PrivateKey> {
        let (key, password) = try_join(self.key(), self.password()).await?;

        let private_key = match password {
            Some(password) => PrivateKey::load_encrypted(key.as_bytes(), password.trim_end())?,
            None => PrivateKey::load(key.as_bytes())?,
        };

        Ok(private_key)
    }
}

/// Application secrets
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecretsConfig {
    /// Encryption key for secure cookies
    #[schemars(
        with = "String",
        regex(pattern = r"[0-9a-fA-F]{64}"),
        example = "example_secret"
    )]
    #[serde_as(as = "serde_with::hex::Hex")]
    pub encryption: [u8; 32],

    /// List of private keys used to sign ID tokens.
    ///
    /// The first key is the one currently used, the others are only published
    /// so that previously signed tokens can still be verified.
    #[serde(default)]
    keys: Vec<KeyConfig>,
}

impl SecretsConfig {
    /// Create a secrets config out of an encryption key and a list of keys
    #[must_use]
    pub fn new(encryption: [u8; 32], keys: Vec<KeyConfig>) -> Self {
        Self { encryption, keys }
    }

    /// Derive a signing keystore out of the config
    ///
    /// # Errors
    ///
    /// Returns an error when a key could not be imported
    #[tracing::instrument(name = "secrets.load", skip_all)]
    pub async fn key_store(&self) -> anyhow::Result<Keystore> {
        let keys = try_join_all(self.keys.iter().map(KeyConfig::private_key)).await?;
        tracing::info!(count = keys.len(), "Loaded signing keys");

        Ok(Keystore::new(keys))
    }
}

impl ConfigurationSection for SecretsConfig {
    const PATH: Option<&'static str> = Some("secrets");

    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        if self.encryption.iter().all(|byte| *byte == 0) {
            let error = figment::Error::from(
                "The cookie encryption key must not be all zeroes".to_owned(),
            );
            return Err(error_on_field::<Self>(figment, error, "encryption").into());
        }

        Ok(())
    }
}
