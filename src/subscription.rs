//! Persistent state of a subscription to a topic at a hub.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::token::TokenDigest;

/// Identifier of a subscription, unique per (topic, hub) pair.
///
/// The identifier of a pair is the lowercase hex SHA-256 digest of the topic URL followed by the
/// hub URL, so it stays the same across processes and versions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

/// Version of the protocol spoken by a hub.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// PubSubHubbub 0.3. Verification requests echo `hub.verify_token`.
    #[default]
    #[serde(rename = "0.3")]
    V0_3,
    /// PubSubHubbub 0.4 (WebSub). Verification requests carry no token and hubs may deny.
    #[serde(rename = "0.4")]
    V0_4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// A subscribe request has been sent and the hub hasn't confirmed it yet.
    NotVerified,
    Verified,
    /// An unsubscribe request has been sent and the hub hasn't confirmed it yet.
    ToDelete,
    Denied,
}

/// One subscription, as kept by a [`Storage`](crate::db::Storage).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionId,
    pub topic_url: String,
    pub hub_url: String,
    pub hub_protocol: ProtocolVersion,
    /// Unix time of the first subscribe attempt.
    pub created_time: u64,
    /// `None` if no particular lease was requested or granted.
    pub lease_seconds: Option<u64>,
    /// Digest of the verify token sent with the latest request. The token itself is never kept.
    pub verify_token: TokenDigest,
    /// Secret for the HMAC signatures of content distributions, if one was given to the hub.
    pub secret: Option<String>,
    /// Unix time at which the lease ends.
    pub expiration_time: Option<u64>,
    pub subscription_state: SubscriptionState,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl SubscriptionId {
    pub fn new(topic: &str, hub: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(topic.as_bytes());
        hasher.update(hub.as_bytes());
        SubscriptionId(hex::encode(hasher.finalize()))
    }

    /// Wraps an identifier received from a hub or read from storage.
    pub fn from_key(key: impl Into<String>) -> Self {
        SubscriptionId(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SubscriptionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ProtocolVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V0_3 => "0.3",
            ProtocolVersion::V0_4 => "0.4",
        }
    }

    /// Whether verification requests of this version carry `hub.verify_token`.
    pub fn echoes_verify_token(self) -> bool {
        self == ProtocolVersion::V0_3
    }
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "0.3" => Ok(ProtocolVersion::V0_3),
            "0.4" => Ok(ProtocolVersion::V0_4),
            _ => Err(ParseError {
                kind: "protocol version",
                value: s.to_owned(),
            }),
        }
    }
}

impl SubscriptionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionState::NotVerified => "not_verified",
            SubscriptionState::Verified => "verified",
            SubscriptionState::ToDelete => "to_delete",
            SubscriptionState::Denied => "denied",
        }
    }

    /// Whether a hub may confirm a subscription (or deny one) in this state.
    pub fn accepts_subscribe(self) -> bool {
        matches!(
            self,
            SubscriptionState::NotVerified | SubscriptionState::Verified
        )
    }

    /// Whether a hub may confirm an unsubscription in this state.
    pub fn accepts_unsubscribe(self) -> bool {
        self == SubscriptionState::ToDelete
    }
}

impl Display for SubscriptionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "not_verified" => Ok(SubscriptionState::NotVerified),
            "verified" => Ok(SubscriptionState::Verified),
            "to_delete" => Ok(SubscriptionState::ToDelete),
            "denied" => Ok(SubscriptionState::Denied),
            _ => Err(ParseError {
                kind: "subscription state",
                value: s.to_owned(),
            }),
        }
    }
}
