//! Verify tokens: generated per request, stored only as a digest.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const TOKEN_LEN: usize = 32;

/// A verify token to be sent to a hub in a (un)subscribe request.
///
/// Only its [`digest`](VerifyToken::digest) is persisted.
#[derive(Debug)]
pub struct VerifyToken(String);

/// Lowercase hex SHA-256 digest of a verify token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenDigest(String);

impl VerifyToken {
    /// Generates a fresh token of `TOKEN_LEN` URL-safe characters.
    pub fn generate<R: RngCore + CryptoRng>(mut rng: R) -> Self {
        let mut rand = [0_u8; TOKEN_LEN * 6 / 8];
        rng.fill_bytes(&mut rand);
        VerifyToken(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(rand))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digest(&self) -> TokenDigest {
        TokenDigest::of(&self.0)
    }
}

impl TokenDigest {
    /// Hashes a token value, e.g. one echoed back by a hub.
    pub fn of(token: &str) -> Self {
        TokenDigest(hex::encode(Sha256::digest(token.as_bytes())))
    }

    /// Wraps a digest read from storage.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        TokenDigest(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `token` hashes to this digest.
    pub fn matches(&self, token: &str) -> bool {
        *self == TokenDigest::of(token)
    }
}

impl Display for TokenDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
