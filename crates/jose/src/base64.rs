// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{borrow::Cow, fmt};

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// The value could not be decoded as URL-safe, unpadded base64
#[derive(Debug, Error)]
#[error("invalid base64url value")]
pub struct InvalidBase64(#[from] base64ct::Error);

/// A byte buffer which (de)serializes as URL-safe base64 without padding, as
/// used by the JOSE specifications.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Base64UrlNoPad {
    bytes: Vec<u8>,
}

impl Base64UrlNoPad {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn encode(&self) -> String {
        Base64UrlUnpadded::encode_string(&self.bytes)
    }

    /// Decode a URL-safe, unpadded base64 string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid base64url
    pub fn parse(encoded: &str) -> Result<Self, InvalidBase64> {
        let bytes = Base64UrlUnpadded::decode_vec(encoded)?;
        Ok(Self { bytes })
    }
}

impl fmt::Debug for Base64UrlNoPad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Base64UrlNoPad").field(&self.encode()).finish()
    }
}

impl fmt::Display for Base64UrlNoPad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<Vec<u8>> for Base64UrlNoPad {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl Serialize for Base64UrlNoPad {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Base64UrlNoPad {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded: Cow<'de, str> = Deserialize::deserialize(deserializer)?;
        Self::parse(&encoded).map_err(de::Error::custom)
    }
}
