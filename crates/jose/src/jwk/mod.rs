// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! JSON Web Keys and Key Sets, as defined in [RFC 7517].
//!
//! [RFC 7517]: https://www.rfc-editor.org/rfc/rfc7517

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sha2::{Digest, Sha256};

use crate::jwa::{JsonWebKeyUse, JsonWebSignatureAlg};

mod public_parameters;

pub use self::public_parameters::{JsonWebKeyPublicParameters, RsaPublicParameters};

/// Computes the [RFC 7638] thumbprint of a key
///
/// [RFC 7638]: https://www.rfc-editor.org/rfc/rfc7638
pub trait Thumbprint {
    /// The canonical JSON representation of the required members of the key,
    /// in lexicographic order and without whitespace.
    fn thumbprint_prehashed(&self) -> String;

    /// The SHA-256 digest of the canonical representation
    fn thumbprint_sha256(&self) -> [u8; 32] {
        Sha256::digest(self.thumbprint_prehashed()).into()
    }

    /// The SHA-256 thumbprint, encoded as URL-safe base64 without padding
    fn thumbprint_sha256_base64(&self) -> String {
        Base64UrlUnpadded::encode_string(&self.thumbprint_sha256())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey<P> {
    #[serde(default)]
    alg: Option<JsonWebSignatureAlg>,

    #[serde(default, rename = "use")]
    r#use: Option<JsonWebKeyUse>,

    #[serde(default)]
    kid: Option<String>,

    #[serde(flatten)]
    parameters: P,
}

pub type PublicJsonWebKey = JsonWebKey<JsonWebKeyPublicParameters>;

impl<P> JsonWebKey<P> {
    #[must_use]
    pub const fn new(parameters: P) -> Self {
        Self {
            alg: None,
            r#use: None,
            kid: None,
            parameters,
        }
    }

    #[must_use]
    pub fn with_alg(mut self, alg: JsonWebSignatureAlg) -> Self {
        self.alg = Some(alg);
        self
    }

    #[must_use]
    pub fn with_use(mut self, value: JsonWebKeyUse) -> Self {
        self.r#use = Some(value);
        self
    }

    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    #[must_use]
    pub fn alg(&self) -> Option<JsonWebSignatureAlg> {
        self.alg
    }

    #[must_use]
    pub fn use_(&self) -> Option<JsonWebKeyUse> {
        self.r#use
    }

    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    #[must_use]
    pub const fn params(&self) -> &P {
        &self.parameters
    }

    /// Map the key parameters, keeping the metadata
    pub fn map<T, F: FnOnce(&P) -> T>(&self, mapper: F) -> JsonWebKey<T> {
        JsonWebKey {
            alg: self.alg,
            r#use: self.r#use,
            kid: self.kid.clone(),
            parameters: mapper(&self.parameters),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet<P> {
    keys: Vec<JsonWebKey<P>>,
}

pub type PublicJsonWebKeySet = JsonWebKeySet<JsonWebKeyPublicParameters>;

impl<P> Default for JsonWebKeySet<P> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<P> JsonWebKeySet<P> {
    #[must_use]
    pub fn new(keys: Vec<JsonWebKey<P>>) -> Self {
        Self { keys }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JsonWebKey<P>> {
        self.keys.iter()
    }

    /// Find a key by its key ID
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&JsonWebKey<P>> {
        self.keys.iter().find(|key| key.kid() == Some(kid))
    }
}

impl<P> FromIterator<JsonWebKey<P>> for JsonWebKeySet<P> {
    fn from_iter<T: IntoIterator<Item = JsonWebKey<P>>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, P> IntoIterator for &'a JsonWebKeySet<P> {
    type Item = &'a JsonWebKey<P>;
    type IntoIter = std::slice::Iter<'a, JsonWebKey<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Base64UrlNoPad;

    fn sample_key() -> PublicJsonWebKey {
        let params = RsaPublicParameters::new(
            Base64UrlNoPad::new(vec![0xde, 0xad, 0xbe, 0xef]),
            Base64UrlNoPad::parse("AQAB").unwrap(),
        );
        JsonWebKey::new(JsonWebKeyPublicParameters::Rsa(params))
    }

    #[test]
    fn serialize_key_metadata_first() {
        let key = sample_key()
            .with_alg(JsonWebSignatureAlg::Rs256)
            .with_use(JsonWebKeyUse::Sig)
            .with_kid("abc");

        insta::assert_json_snapshot!(key, @r###"
        {
          "alg": "RS256",
          "use": "sig",
          "kid": "abc",
          "kty": "RSA",
          "n": "3q2-7w",
          "e": "AQAB"
        }
        "###);
    }

    #[test]
    fn skip_missing_metadata() {
        let json = serde_json::to_value(sample_key()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kty": "RSA", "n": "3q2-7w", "e": "AQAB" })
        );
    }

    #[test]
    fn find_by_kid() {
        let set: PublicJsonWebKeySet = [sample_key().with_kid("one"), sample_key().with_kid("two")]
            .into_iter()
            .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.find("two").and_then(JsonWebKey::kid), Some("two"));
        assert!(set.find("three").is_none());
    }
}
