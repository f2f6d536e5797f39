use bytes::Bytes;
use http::header::{HeaderMap, CONTENT_TYPE};

use crate::signature::Signature;
use crate::subscription::{SubscriptionId, SubscriptionRecord};
use crate::util::consts::HUB_SIGNATURE;

/// Media types of content recognized as feeds, matched as case-insensitive prefixes of
/// `Content-Type`.
const FEED_TYPES: [&str; 5] = [
    "application/atom+xml",
    "application/rss+xml",
    "application/xml",
    "text/xml",
    "application/rdf+xml",
];

/// Content distributed by a hub to the callback.
///
/// The content is not authenticated on its own. Call [`authenticate`](Delivery::authenticate)
/// before trusting it.
#[derive(Clone, Debug)]
pub struct Delivery {
    id: SubscriptionId,
    topic: String,
    hub: String,
    headers: HeaderMap,
    content: Bytes,
    feed_update: bool,
    secret: Option<String>,
}

impl Delivery {
    pub(crate) fn new(record: SubscriptionRecord, headers: HeaderMap, content: Bytes) -> Self {
        let feed_update = headers
            .get(CONTENT_TYPE)
            .map_or(false, |v| is_feed_type(v.as_bytes()));
        Delivery {
            id: record.id,
            topic: record.topic_url,
            hub: record.hub_url,
            headers,
            content,
            feed_update,
            secret: record.secret,
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn hub(&self) -> &str {
        &self.hub
    }

    /// Headers of the distribution request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request body, verbatim.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    /// The content, if its media type is one of the feed formats.
    pub fn feed_update(&self) -> Option<&Bytes> {
        self.feed_update.then_some(&self.content)
    }

    pub fn has_feed_update(&self) -> bool {
        self.feed_update
    }

    /// Whether a secret was given to the hub, so that the content is expected to be signed.
    pub fn needs_authentication(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks the `X-Hub-Signature` of the content.
    ///
    /// Always `true` if the subscription has no secret. Otherwise `false` unless the header is
    /// present and matches the HMAC of the content keyed with the secret.
    pub fn authenticate(&self) -> bool {
        let secret = match self.secret {
            Some(ref secret) => secret,
            None => return true,
        };

        let header = match self.headers.get(HUB_SIGNATURE) {
            Some(v) => v,
            None => {
                log::debug!("Content for {}: missing signature", self.id);
                return false;
            }
        };

        let signature = match Signature::parse(header.as_bytes()) {
            Ok(signature) => signature,
            Err(e) => {
                log::debug!("Content for {}: malformed signature: {:?}", self.id, e);
                return false;
            }
        };

        match signature.verify(secret.as_bytes(), &self.content) {
            Ok(()) => true,
            Err(_) => {
                log::debug!("Content for {}: signature mismatch", self.id);
                false
            }
        }
    }
}

fn is_feed_type(content_type: &[u8]) -> bool {
    FEED_TYPES.iter().any(|t| {
        content_type
            .get(..t.len())
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case(t.as_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use http::header::HeaderValue;

    use crate::token::TokenDigest;

    use super::*;

    const BODY: &[u8] = b"<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>";

    fn record(secret: Option<&str>) -> SubscriptionRecord {
        let topic = "http://www.example.com/topic";
        let hub = "http://hub.example.com/";
        SubscriptionRecord {
            id: SubscriptionId::new(topic, hub),
            topic_url: topic.to_owned(),
            hub_url: hub.to_owned(),
            hub_protocol: Default::default(),
            created_time: 0,
            lease_seconds: None,
            verify_token: TokenDigest::of("cba"),
            secret: secret.map(str::to_owned),
            expiration_time: None,
            subscription_state: crate::subscription::SubscriptionState::Verified,
        }
    }

    fn delivery(secret: Option<&str>, headers: &[(&'static str, &str)]) -> Delivery {
        let mut map = HeaderMap::new();
        for &(name, value) in headers {
            map.insert(name, HeaderValue::from_str(value).unwrap());
        }
        Delivery::new(record(secret), map, Bytes::from_static(BODY))
    }

    #[test]
    fn classifies_feeds() {
        for feed in [
            "application/atom+xml",
            "Application/RSS+XML; charset=utf-8",
            "text/xml",
        ] {
            let d = delivery(None, &[("content-type", feed)]);
            assert!(d.has_feed_update(), "{}", feed);
            assert_eq!(d.feed_update().map(|b| &b[..]), Some(BODY));
        }

        let d = delivery(None, &[("content-type", "text/html")]);
        assert!(!d.has_feed_update());
        assert_eq!(d.feed_update(), None);
        assert_eq!(d.content(), BODY);

        let d = delivery(None, &[]);
        assert!(!d.has_feed_update());
    }

    #[test]
    fn authentication() {
        let signature = Signature::sign(b"s", BODY).to_string();

        let d = delivery(Some("s"), &[("x-hub-signature", &signature)]);
        assert!(d.needs_authentication());
        assert!(d.authenticate());

        let d = delivery(Some("wrong"), &[("x-hub-signature", &signature)]);
        assert!(!d.authenticate());

        let d = delivery(Some("s"), &[]);
        assert!(!d.authenticate());

        let d = delivery(Some("s"), &[("x-hub-signature", "md5=00")]);
        assert!(!d.authenticate());

        let d = delivery(None, &[]);
        assert!(!d.needs_authentication());
        assert!(d.authenticate());
    }
}
