//! Typed options of a [`Notifier`](crate::hub::Notifier).

use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::time::Duration;

use base64::Engine;
use http::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use http::Uri;

use crate::hub::request::VerificationMode;
use crate::subscription::ProtocolVersion;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters set from the subscription itself, which extra parameters may not replace.
///
/// The stored record is derived from these, so a different value sent to the hub would make its
/// verification request unmatchable.
const RESERVED_PARAMETERS: [&str; 7] = [
    "hub.callback",
    "hub.lease_seconds",
    "hub.mode",
    "hub.secret",
    "hub.topic",
    "hub.verify",
    "hub.verify_token",
];

/// Misuse of the library by its caller, as opposed to misbehavior of a hub.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid {name} `{value}`: must be a non-empty absolute URL")]
    InvalidUrl { name: &'static str, value: String },
    #[error("no hub URLs have been set, so no subscriptions can be attempted")]
    NoHubs,
    #[error("invalid parameter `{0}`: names and values must be non-empty")]
    InvalidParameter(String),
    #[error("parameter `{0}` is set by the subscription and cannot be overridden")]
    ReservedParameter(String),
    #[error("invalid basic authentication credentials")]
    InvalidCredentials(#[source] InvalidHeaderValue),
    #[error("subscription key was not set and could not be inferred from the request")]
    MissingSubscriptionKey,
}

/// What to subscribe to, where to, and how.
#[derive(Clone, Debug)]
pub struct Config {
    topic: String,
    callback: String,
    hubs: Vec<HubConfig>,
    lease_seconds: Option<NonZeroU64>,
    preferred_verification: VerificationMode,
    secret: Option<String>,
    parameters: BTreeMap<String, String>,
    headers: HeaderMap,
    use_path_parameter: bool,
    timeout: Duration,
}

/// A hub along with the options that only apply to it.
#[derive(Clone, Debug)]
pub struct HubConfig {
    url: String,
    protocol: ProtocolVersion,
    headers: HeaderMap,
    parameters: BTreeMap<String, String>,
    secret: Option<String>,
}

impl Config {
    pub fn new(topic: impl Into<String>, callback: impl Into<String>) -> Result<Self, ConfigError> {
        let topic = validate_url(topic.into(), "topic URL")?;
        let callback = validate_url(callback.into(), "callback URL")?;
        Ok(Config {
            topic,
            callback,
            hubs: Vec::new(),
            lease_seconds: None,
            preferred_verification: VerificationMode::Sync,
            secret: None,
            parameters: BTreeMap::new(),
            headers: HeaderMap::new(),
            use_path_parameter: false,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Adds a hub. A hub with the same URL as an existing one replaces its options.
    pub fn hub(mut self, hub: HubConfig) -> Self {
        if let Some(existing) = self.hubs.iter_mut().find(|h| h.url == hub.url) {
            *existing = hub;
        } else {
            self.hubs.push(hub);
        }
        self
    }

    pub fn remove_hub(mut self, url: &str) -> Self {
        self.hubs.retain(|h| h.url != url);
        self
    }

    pub fn lease_seconds(mut self, lease_seconds: Option<NonZeroU64>) -> Self {
        self.lease_seconds = lease_seconds;
        self
    }

    pub fn preferred_verification(mut self, mode: VerificationMode) -> Self {
        self.preferred_verification = mode;
        self
    }

    /// Sets the `hub.secret` sent to hubs that don't have one of their own.
    pub fn secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Adds an extra form parameter sent to every hub.
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let (name, value) = validate_parameter(name.into(), value.into())?;
        self.parameters.insert(name, value);
        Ok(self)
    }

    pub fn remove_parameter(mut self, name: &str) -> Self {
        self.parameters.remove(name);
        self
    }

    /// Adds an extra header sent to every hub.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Embeds the subscription id in the callback URL as a trailing path segment rather than as
    /// the `xhub.subscription` query parameter.
    pub fn use_path_parameter(mut self, yes: bool) -> Self {
        self.use_path_parameter = yes;
        self
    }

    /// Bounds the time each request to a hub may take.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn topic_url(&self) -> &str {
        &self.topic
    }

    pub fn callback_url(&self) -> &str {
        &self.callback
    }

    pub fn hubs(&self) -> &[HubConfig] {
        &self.hubs
    }

    pub fn get_lease_seconds(&self) -> Option<NonZeroU64> {
        self.lease_seconds
    }

    pub fn get_preferred_verification(&self) -> VerificationMode {
        self.preferred_verification
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn uses_path_parameter(&self) -> bool {
        self.use_path_parameter
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    /// The secret to send to `hub`, if any.
    pub fn secret_for<'a>(&'a self, hub: &'a HubConfig) -> Option<&'a str> {
        hub.secret.as_deref().or(self.secret.as_deref())
    }
}

impl HubConfig {
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(HubConfig {
            url: validate_url(url.into(), "hub URL")?,
            protocol: ProtocolVersion::default(),
            headers: HeaderMap::new(),
            parameters: BTreeMap::new(),
            secret: None,
        })
    }

    pub fn protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    /// Authenticates to the hub with HTTP basic authentication.
    pub fn basic_auth(self, user: &str, password: &str) -> Result<Self, ConfigError> {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
        let mut value = HeaderValue::try_from(format!("Basic {}", credentials))
            .map_err(ConfigError::InvalidCredentials)?;
        value.set_sensitive(true);
        Ok(self.header(http::header::AUTHORIZATION, value))
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds an extra form parameter sent to this hub only, taking precedence over a global one of
    /// the same name.
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let (name, value) = validate_parameter(name.into(), value.into())?;
        self.parameters.insert(name, value);
        Ok(self)
    }

    pub fn secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn get_protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

/// Checks that `url` is an absolute URL, i.e. one with a scheme and an authority.
pub(crate) fn validate_url(url: String, name: &'static str) -> Result<String, ConfigError> {
    match url.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() && uri.authority().is_some() => Ok(url),
        _ => Err(ConfigError::InvalidUrl { name, value: url }),
    }
}

fn validate_parameter(name: String, value: String) -> Result<(String, String), ConfigError> {
    if name.is_empty() || value.is_empty() {
        return Err(ConfigError::InvalidParameter(name));
    }
    if RESERVED_PARAMETERS.contains(&&*name) {
        return Err(ConfigError::ReservedParameter(name));
    }
    Ok((name, value))
}
