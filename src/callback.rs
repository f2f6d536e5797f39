//! Handling of requests from hubs to the callback URL.

pub mod content;
pub mod service;

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::num::NonZeroU64;
use std::str::FromStr;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use serde::Deserialize;

use crate::clock::{Clock, SystemClock};
use crate::config::ConfigError;
use crate::db::Storage;
use crate::subscription::{ProtocolVersion, SubscriptionId, SubscriptionRecord, SubscriptionState};
use crate::util::{self, consts, encode};
use crate::Error;

pub use self::content::Delivery;
pub use self::service::{Service, Updates};

/// Verifies (un)subscription intents and accepts content distributions on behalf of the
/// subscriptions kept in a [`Storage`].
#[derive(Debug)]
pub struct Callback<St, C = SystemClock> {
    storage: St,
    clock: C,
    subscription_key: Option<SubscriptionId>,
    callback_path: Option<String>,
    subscriber_count: NonZeroU64,
}

/// A response to a hub along with what the request amounted to.
#[derive(Debug)]
pub struct Handled {
    response: Response<Bytes>,
    outcome: Outcome,
}

#[derive(Debug)]
pub enum Outcome {
    /// The hub verified an intent, and the subscription record was updated accordingly.
    Confirmed(Confirmation),
    /// The request was answered with `404 Not Found`.
    Rejected(Reason),
    /// The hub distributed content.
    Content(Delivery),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Confirmation {
    Subscribed,
    Unsubscribed,
    Denied,
}

/// Why a request from a hub was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    /// No subscription has the requested id.
    UnknownSubscription,
    /// Required parameters are missing or malformed, or the method isn't supported.
    BadRequest,
    /// The echoed verify token isn't the one sent with the latest request.
    TokenMismatch,
    /// The subscription isn't in a state where the requested transition is allowed.
    StateMismatch,
}

#[derive(Debug, Default, Deserialize)]
struct Verify {
    #[serde(rename = "hub.mode", alias = "hub_mode")]
    mode: Option<String>,
    #[serde(rename = "hub.topic", alias = "hub_topic")]
    topic: Option<String>,
    #[serde(rename = "hub.challenge", alias = "hub_challenge")]
    challenge: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "hub_verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.lease_seconds", alias = "hub_lease_seconds")]
    #[serde(default, deserialize_with = "util::deserialize_some_from_str")]
    lease_seconds: Option<LeaseSeconds>,
}

/// Value of `hub.lease_seconds`, which may be present but empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LeaseSeconds {
    Null,
    Seconds(u64),
}

enum Intent {
    Subscribe(LeaseSeconds),
    Unsubscribe,
    Denied,
}

impl<St> Callback<St> {
    pub fn new(storage: St) -> Self {
        Callback {
            storage,
            clock: SystemClock,
            subscription_key: None,
            callback_path: None,
            subscriber_count: NonZeroU64::MIN,
        }
    }
}

impl<St, C> Callback<St, C> {
    /// Replaces the source of the current time, used when renewing leases.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Callback<St, C2> {
        Callback {
            storage: self.storage,
            clock,
            subscription_key: self.subscription_key,
            callback_path: self.callback_path,
            subscriber_count: self.subscriber_count,
        }
    }

    /// Handles every request as addressed to the subscription `key`, regardless of its URL.
    pub fn subscription_key(mut self, key: SubscriptionId) -> Self {
        self.subscription_key = Some(key);
        self
    }

    /// Path of the callback URL under which subscription ids are given as a trailing path
    /// segment, for subscriptions made with [`Config::use_path_parameter`].
    ///
    /// [`Config::use_path_parameter`]: crate::config::Config::use_path_parameter
    pub fn callback_path(mut self, prefix: impl Into<String>) -> Self {
        self.callback_path = Some(prefix.into());
        self
    }

    /// Number of subscribers reported to hubs in `X-Hub-On-Behalf-Of`.
    pub fn subscriber_count(mut self, count: NonZeroU64) -> Self {
        self.subscriber_count = count;
        self
    }

    pub fn storage(&self) -> &St {
        &self.storage
    }
}

impl<St, C> Callback<St, C>
where
    St: Storage,
    C: Clock,
{
    /// Handles a request from a hub.
    ///
    /// Every request the hub got wrong is answered with `404 Not Found` and reported as
    /// [`Outcome::Rejected`]. An `Err` is only returned if no subscription id could be found for
    /// the request, which means that the callback is misconfigured, or if the storage failed.
    pub fn handle(&self, req: Request<Bytes>) -> Result<Handled, Error<St::Error>> {
        let id = self
            .resolve_key(&req)
            .ok_or(ConfigError::MissingSubscriptionKey)?;

        let record = match self.storage.get_subscription(&id).map_err(Error::Storage)? {
            Some(record) => record,
            None => {
                log::warn!("Callback for unknown subscription {}", id);
                return Ok(Handled::rejected(Reason::UnknownSubscription));
            }
        };

        match *req.method() {
            Method::GET => self.verify(record, req.uri().query().unwrap_or("")),
            Method::POST => {
                let (parts, body) = req.into_parts();
                Ok(self.accept_content(record, parts.headers, body))
            }
            _ => {
                log::warn!("Callback {}: unsupported method {}", id, req.method());
                Ok(Handled::rejected(Reason::BadRequest))
            }
        }
    }

    fn resolve_key<B>(&self, req: &Request<B>) -> Option<SubscriptionId> {
        if let Some(ref key) = self.subscription_key {
            return Some(key.clone());
        }

        // Read apart from `Verify`, so that a malformed verification request is still resolved
        // to its subscription.
        let pairs = req
            .uri()
            .query()
            .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
            .unwrap_or_default();
        let key = pairs.into_iter().find_map(|(name, value)| {
            (name == "xhub.subscription" || name == "xhub_subscription").then_some(value)
        });
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            return Some(SubscriptionId::from_key(key));
        }

        let prefix = self.callback_path.as_deref()?;
        let segment = req
            .uri()
            .path()
            .strip_prefix(prefix.trim_end_matches('/'))?
            .strip_prefix('/')?;
        if segment.is_empty() || segment.contains('/') {
            return None;
        }
        encode::decode(segment).map(SubscriptionId::from_key)
    }

    fn verify(&self, record: SubscriptionRecord, query: &str) -> Result<Handled, Error<St::Error>> {
        let id = record.id.clone();
        let reject = |reason: Reason| {
            log::warn!("Rejecting verification of {}: {}", id, reason);
            Ok(Handled::rejected(reason))
        };

        let verify: Verify = match serde_urlencoded::from_str(query) {
            Ok(verify) => verify,
            Err(e) => {
                log::debug!("Callback {}: malformed query: {}", id, e);
                return reject(Reason::BadRequest);
            }
        };

        let intent = match verify.intent(record.hub_protocol) {
            Some(intent) => intent,
            None => return reject(Reason::BadRequest),
        };

        if record.hub_protocol.echoes_verify_token() {
            let token = verify.verify_token.as_deref().unwrap_or_default();
            if !record.verify_token.matches(token) {
                return reject(Reason::TokenMismatch);
            }
        }

        let prior = record.subscription_state;
        let allowed = match intent {
            Intent::Subscribe(_) | Intent::Denied => prior.accepts_subscribe(),
            Intent::Unsubscribe => prior.accepts_unsubscribe(),
        };
        if !allowed {
            return reject(Reason::StateMismatch);
        }

        let (next, confirmation) = match intent {
            Intent::Subscribe(lease_seconds) => {
                let mut next = SubscriptionRecord {
                    subscription_state: SubscriptionState::Verified,
                    ..record.clone()
                };
                match lease_seconds {
                    LeaseSeconds::Seconds(lease_seconds) => {
                        let from = if prior == SubscriptionState::NotVerified {
                            next.created_time
                        } else {
                            self.clock.now()
                        };
                        next.lease_seconds = Some(lease_seconds);
                        next.expiration_time = Some(from.saturating_add(lease_seconds));
                    }
                    LeaseSeconds::Null => {
                        next.lease_seconds = None;
                        next.expiration_time = None;
                    }
                }
                (Some(next), Confirmation::Subscribed)
            }
            Intent::Unsubscribe => (None, Confirmation::Unsubscribed),
            Intent::Denied => {
                let next = SubscriptionRecord {
                    subscription_state: SubscriptionState::Denied,
                    ..record.clone()
                };
                (Some(next), Confirmation::Denied)
            }
        };

        let applied = self
            .storage
            .transition_subscription(&record, next.as_ref())
            .map_err(Error::Storage)?;
        if !applied {
            // Another request or a newer (un)subscribe attempt got there first.
            return reject(Reason::StateMismatch);
        }

        log::info!("Verified {:?} of {}", confirmation, id);

        // `verify.challenge` went through a lossy UTF-8 conversion.
        let challenge = raw_query_value(query, &["hub.challenge", "hub_challenge"])
            .map_or_else(Bytes::new, |c| Bytes::from(c.into_owned()));
        Ok(Handled {
            response: Response::new(challenge),
            outcome: Outcome::Confirmed(confirmation),
        })
    }

    fn accept_content(
        &self,
        record: SubscriptionRecord,
        headers: http::HeaderMap,
        body: Bytes,
    ) -> Handled {
        log::debug!("Content for {} ({} bytes)", record.id, body.len());

        let mut response = Response::new(Bytes::new());
        response.headers_mut().insert(
            HeaderName::from_static(consts::HUB_ON_BEHALF_OF),
            HeaderValue::from(self.subscriber_count.get()),
        );

        Handled {
            response,
            outcome: Outcome::Content(Delivery::new(record, headers, body)),
        }
    }
}

impl Handled {
    fn rejected(reason: Reason) -> Self {
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = StatusCode::NOT_FOUND;
        Handled {
            response,
            outcome: Outcome::Rejected(reason),
        }
    }

    pub fn response(&self) -> &Response<Bytes> {
        &self.response
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_response(self) -> Response<Bytes> {
        self.response
    }

    pub fn into_parts(self) -> (Response<Bytes>, Outcome) {
        (self.response, self.outcome)
    }
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::UnknownSubscription => "unknown subscription",
            Reason::BadRequest => "bad request",
            Reason::TokenMismatch => "verify token mismatch",
            Reason::StateMismatch => "subscription state mismatch",
        }
    }
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Verify {
    /// Checks that the parameters required by `protocol` are present.
    fn intent(&self, protocol: ProtocolVersion) -> Option<Intent> {
        if self.mode.as_deref() == Some("denied") && protocol == ProtocolVersion::V0_4 {
            return self.topic.as_ref().map(|_| Intent::Denied);
        }

        self.topic.as_ref()?;
        self.challenge.as_ref()?;
        if protocol.echoes_verify_token() {
            self.verify_token.as_ref()?;
        }

        match self.mode.as_deref()? {
            "subscribe" => self.lease_seconds.map(Intent::Subscribe),
            "unsubscribe" => Some(Intent::Unsubscribe),
            _ => None,
        }
    }
}

/// The first value of any of `names` in `query`, percent-decoded into raw bytes.
fn raw_query_value<'a>(query: &'a str, names: &[&str]) -> Option<Cow<'a, [u8]>> {
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = encode::decode_form(name);
        names
            .iter()
            .any(|n| *name == *n.as_bytes())
            .then(|| encode::decode_form(value))
    })
}

impl FromStr for LeaseSeconds {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Ok(LeaseSeconds::Null)
        } else {
            s.parse().map(LeaseSeconds::Seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::MemoryStore;
    use crate::token::TokenDigest;

    use super::*;

    const TOPIC: &str = "http://www.example.com/topic";
    const HUB: &str = "http://hub.example.com/";
    const CREATED: u64 = 1_600_000_000;
    const NOW: u64 = 1_700_000_000;

    fn store(protocol: ProtocolVersion, state: SubscriptionState) -> (MemoryStore, SubscriptionId) {
        let id = SubscriptionId::new(TOPIC, HUB);
        let store = MemoryStore::new();
        store
            .set_subscription(&SubscriptionRecord {
                id: id.clone(),
                topic_url: TOPIC.to_owned(),
                hub_url: HUB.to_owned(),
                hub_protocol: protocol,
                created_time: CREATED,
                lease_seconds: Some(60),
                verify_token: TokenDigest::of("cba"),
                secret: None,
                expiration_time: Some(CREATED + 60),
                subscription_state: state,
            })
            .unwrap();
        (store, id)
    }

    fn callback(store: &MemoryStore) -> Callback<&MemoryStore, impl Clock> {
        Callback::new(store).with_clock(|| NOW)
    }

    fn get(query: &str) -> Request<Bytes> {
        Request::get(format!("http://www.example.com/callback?{}", query))
            .body(Bytes::new())
            .unwrap()
    }

    fn verify_query(id: &SubscriptionId, params: &[(&str, &str)]) -> String {
        let mut query = format!("xhub.subscription={}", id);
        for (name, value) in params {
            query.push('&');
            query.push_str(&serde_urlencoded::to_string([(name, value)]).unwrap());
        }
        query
    }

    fn subscribe_params(token: &str) -> Vec<(&'static str, &str)> {
        vec![
            ("hub.mode", "subscribe"),
            ("hub.topic", TOPIC),
            ("hub.challenge", "abc"),
            ("hub.verify_token", token),
            ("hub.lease_seconds", "1234567"),
        ]
    }

    fn rejection(handled: &Handled) -> Option<Reason> {
        assert_eq!(
            handled.response().status() == StatusCode::NOT_FOUND,
            matches!(handled.outcome(), Outcome::Rejected(_))
        );
        match *handled.outcome() {
            Outcome::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn subscribe() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &subscribe_params("cba"))))
            .unwrap();

        assert_eq!(handled.response().status(), StatusCode::OK);
        assert_eq!(handled.response().body(), "abc");
        assert!(matches!(
            handled.outcome(),
            Outcome::Confirmed(Confirmation::Subscribed)
        ));
        let record = store.get_subscription(&id).unwrap().unwrap();
        assert_eq!(record.subscription_state, SubscriptionState::Verified);
        assert_eq!(record.lease_seconds, Some(1234567));
        assert_eq!(record.expiration_time, Some(CREATED + 1234567));
    }

    #[test]
    fn renewal_counts_from_now() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::Verified);

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &subscribe_params("cba"))))
            .unwrap();

        assert_eq!(handled.response().status(), StatusCode::OK);
        let record = store.get_subscription(&id).unwrap().unwrap();
        assert_eq!(record.subscription_state, SubscriptionState::Verified);
        assert_eq!(record.expiration_time, Some(NOW + 1234567));
    }

    #[test]
    fn null_lease_clears_expiration() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let mut params = subscribe_params("cba");
        params[4].1 = "";

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &params)))
            .unwrap();

        assert_eq!(handled.response().status(), StatusCode::OK);
        let record = store.get_subscription(&id).unwrap().unwrap();
        assert_eq!(record.lease_seconds, None);
        assert_eq!(record.expiration_time, None);
    }

    #[test]
    fn challenge_is_echoed_verbatim() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let params = subscribe_params("cba")
            .into_iter()
            .filter(|&(name, _)| name != "hub.challenge")
            .collect::<Vec<_>>();
        let query = format!("{}&hub.challenge=%FF%FEa+b%2B", verify_query(&id, &params));

        let handled = callback(&store).handle(get(&query)).unwrap();

        assert_eq!(handled.response().status(), StatusCode::OK);
        assert_eq!(&handled.response().body()[..], b"\xFF\xFEa b+");
    }

    #[test]
    fn token_mismatch() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let before = store.get_subscription(&id).unwrap();

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &subscribe_params("wrongtoken"))))
            .unwrap();

        assert_eq!(rejection(&handled), Some(Reason::TokenMismatch));
        assert!(handled.response().body().is_empty());
        assert_eq!(store.get_subscription(&id).unwrap(), before);
    }

    #[test]
    fn missing_parameters() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let callback = callback(&store);

        for missing in [
            "hub.mode",
            "hub.topic",
            "hub.challenge",
            "hub.verify_token",
            "hub.lease_seconds",
        ] {
            let params = subscribe_params("cba")
                .into_iter()
                .filter(|&(name, _)| name != missing)
                .collect::<Vec<_>>();
            let handled = callback.handle(get(&verify_query(&id, &params))).unwrap();
            assert_eq!(rejection(&handled), Some(Reason::BadRequest), "{}", missing);
        }

        let mut params = subscribe_params("cba");
        params[0].1 = "Subscribe";
        let handled = callback.handle(get(&verify_query(&id, &params))).unwrap();
        assert_eq!(rejection(&handled), Some(Reason::BadRequest));

        let mut params = subscribe_params("cba");
        params[4].1 = "forever";
        let handled = callback.handle(get(&verify_query(&id, &params))).unwrap();
        assert_eq!(rejection(&handled), Some(Reason::BadRequest));

        assert_eq!(
            store.get_subscription(&id).unwrap().unwrap().subscription_state,
            SubscriptionState::NotVerified
        );
    }

    #[test]
    fn denied_under_0_4() {
        let (store, id) = store(ProtocolVersion::V0_4, SubscriptionState::NotVerified);

        let handled = callback(&store)
            .handle(get(&verify_query(
                &id,
                &[("hub.mode", "denied"), ("hub.topic", TOPIC)],
            )))
            .unwrap();

        assert_eq!(handled.response().status(), StatusCode::OK);
        assert!(matches!(
            handled.outcome(),
            Outcome::Confirmed(Confirmation::Denied)
        ));
        let record = store.get_subscription(&id).unwrap().unwrap();
        assert_eq!(record.subscription_state, SubscriptionState::Denied);
        assert_eq!(record.expiration_time, Some(CREATED + 60));
    }

    #[test]
    fn denied_requires_0_4() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);

        let handled = callback(&store)
            .handle(get(&verify_query(
                &id,
                &[
                    ("hub.mode", "denied"),
                    ("hub.topic", TOPIC),
                    ("hub.challenge", "abc"),
                    ("hub.verify_token", "cba"),
                ],
            )))
            .unwrap();

        assert_eq!(rejection(&handled), Some(Reason::BadRequest));
    }

    #[test]
    fn subscribe_under_0_4_skips_token() {
        let (store, id) = store(ProtocolVersion::V0_4, SubscriptionState::NotVerified);
        let params = subscribe_params("cba")
            .into_iter()
            .filter(|&(name, _)| name != "hub.verify_token")
            .collect::<Vec<_>>();

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &params)))
            .unwrap();

        assert_eq!(handled.response().body(), "abc");
    }

    #[test]
    fn unsubscribe() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::Verified);
        let params = [
            ("hub.mode", "unsubscribe"),
            ("hub.topic", TOPIC),
            ("hub.challenge", "abc"),
            ("hub.verify_token", "cba"),
        ];

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &params)))
            .unwrap();
        assert_eq!(rejection(&handled), Some(Reason::StateMismatch));
        assert!(store.has_subscription(&id).unwrap());

        let mut record = store.get_subscription(&id).unwrap().unwrap();
        record.subscription_state = SubscriptionState::ToDelete;
        store.set_subscription(&record).unwrap();

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &params)))
            .unwrap();
        assert_eq!(handled.response().body(), "abc");
        assert!(matches!(
            handled.outcome(),
            Outcome::Confirmed(Confirmation::Unsubscribed)
        ));
        assert!(store.is_empty());
    }

    /// A store in which a new (un)subscribe attempt is written ahead right after every read.
    struct RenewedAfterRead(MemoryStore);

    impl Storage for RenewedAfterRead {
        type Error = crate::util::Never;

        fn get_subscription(
            &self,
            id: &SubscriptionId,
        ) -> Result<Option<SubscriptionRecord>, Self::Error> {
            let record = self.0.get_subscription(id)?;
            if let Some(ref record) = record {
                let mut renewed = record.clone();
                renewed.verify_token = TokenDigest::of("newer");
                self.0.set_subscription(&renewed)?;
            }
            Ok(record)
        }

        fn set_subscription(&self, record: &SubscriptionRecord) -> Result<(), Self::Error> {
            self.0.set_subscription(record)
        }

        fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, Self::Error> {
            self.0.delete_subscription(id)
        }

        fn transition_subscription(
            &self,
            prior: &SubscriptionRecord,
            next: Option<&SubscriptionRecord>,
        ) -> Result<bool, Self::Error> {
            self.0.transition_subscription(prior, next)
        }
    }

    #[test]
    fn stale_confirmation_loses_to_newer_attempt() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::Verified);
        let store = RenewedAfterRead(store);

        let handled = Callback::new(&store)
            .with_clock(|| NOW)
            .handle(get(&verify_query(&id, &subscribe_params("cba"))))
            .unwrap();

        assert_eq!(rejection(&handled), Some(Reason::StateMismatch));
        let record = store.0.get_subscription(&id).unwrap().unwrap();
        assert_eq!(record.verify_token, TokenDigest::of("newer"));
        assert_eq!(record.expiration_time, Some(CREATED + 60));
    }

    #[test]
    fn subscribe_to_deleting_subscription() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::ToDelete);

        let handled = callback(&store)
            .handle(get(&verify_query(&id, &subscribe_params("cba"))))
            .unwrap();

        assert_eq!(rejection(&handled), Some(Reason::StateMismatch));
    }

    #[test]
    fn underscored_keys() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let query = format!(
            "xhub_subscription={}&hub_mode=subscribe&hub_topic={}&hub_challenge=abc\
             &hub_verify_token=cba&hub_lease_seconds=10",
            id,
            encode::canonical(TOPIC)
        );

        let handled = callback(&store).handle(get(&query)).unwrap();

        assert_eq!(handled.response().body(), "abc");
    }

    #[test]
    fn subscription_key_sources() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let query = serde_urlencoded::to_string(subscribe_params("cba")).unwrap();

        // No key anywhere: misconfiguration rather than a rejection.
        let result = callback(&store).handle(get(&query));
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingSubscriptionKey))
        ));

        let handled = callback(&store)
            .subscription_key(id.clone())
            .handle(get(&query))
            .unwrap();
        assert_eq!(handled.response().body(), "abc");

        let (store, id) = self::store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let req = Request::get(format!(
            "http://www.example.com/websub/callback/{}?{}",
            id, query
        ))
        .body(Bytes::new())
        .unwrap();
        let handled = callback(&store)
            .callback_path("/websub/callback/")
            .handle(req)
            .unwrap();
        assert_eq!(handled.response().body(), "abc");
    }

    #[test]
    fn unknown_subscription() {
        let (store, _) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let other = SubscriptionId::new(TOPIC, "http://other.example.com/");

        let handled = callback(&store)
            .handle(get(&verify_query(&other, &subscribe_params("cba"))))
            .unwrap();

        assert_eq!(rejection(&handled), Some(Reason::UnknownSubscription));
    }

    #[test]
    fn other_methods() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::NotVerified);
        let req = Request::put(format!(
            "http://www.example.com/callback?xhub.subscription={}",
            id
        ))
        .body(Bytes::new())
        .unwrap();

        let handled = callback(&store).handle(req).unwrap();

        assert_eq!(rejection(&handled), Some(Reason::BadRequest));
    }

    #[test]
    fn content() {
        let (store, id) = store(ProtocolVersion::V0_3, SubscriptionState::Verified);
        let req = Request::post(format!(
            "http://www.example.com/callback?xhub.subscription={}",
            id
        ))
        .header("content-type", "application/atom+xml")
        .body(Bytes::from_static(b"<feed/>"))
        .unwrap();

        let handled = callback(&store)
            .subscriber_count(NonZeroU64::new(3).unwrap())
            .handle(req)
            .unwrap();

        assert_eq!(handled.response().status(), StatusCode::OK);
        assert_eq!(handled.response().headers()["x-hub-on-behalf-of"], "3");
        match handled.outcome() {
            Outcome::Content(delivery) => {
                assert_eq!(delivery.id(), &id);
                assert_eq!(delivery.topic(), TOPIC);
                assert!(delivery.has_feed_update());
                assert_eq!(delivery.content(), &b"<feed/>"[..]);
                assert!(delivery.authenticate());
            }
            outcome => panic!("unexpected outcome: {:?}", outcome),
        }
    }
}
