//! Form parameters of (un)subscribe requests.

use std::fmt::{self, Display, Formatter};

use crate::config::{Config, HubConfig};
use crate::subscription::SubscriptionId;
use crate::util::{encode, natord};

/// Name of the callback query parameter carrying the subscription id.
pub const SUBSCRIPTION_KEY_PARAM: &str = "xhub.subscription";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Subscribe,
    Unsubscribe,
}

/// Value of `hub.verify`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VerificationMode {
    #[default]
    Sync,
    Async,
}

/// An ordered multimap of form parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Subscribe => "subscribe",
            Mode::Unsubscribe => "unsubscribe",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VerificationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationMode::Sync => "sync",
            VerificationMode::Async => "async",
        }
    }

    fn other(self) -> Self {
        match self {
            VerificationMode::Sync => VerificationMode::Async,
            VerificationMode::Async => VerificationMode::Sync,
        }
    }
}

impl Params {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends a value, keeping any earlier values of `name`.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.pairs.retain(|(n, _)| *n != name);
        self.pairs.push((name, value.into()));
    }

    /// The first value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| &**v)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| &**v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (&**n, &**v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Serializes the parameters as `application/x-www-form-urlencoded`.
    ///
    /// Names and values are percent-encoded, then the pairs are sorted by the natural order of the
    /// encoded names. The sort is stable, so repeated names keep their relative order and the
    /// output depends only on the set of parameters, not on the order they were added in.
    pub fn to_form_body(&self) -> String {
        let mut encoded = self
            .pairs
            .iter()
            .map(|(n, v)| (encode::canonical(n), encode::canonical(v)))
            .collect::<Vec<_>>();
        encoded.sort_by(|(a, _), (b, _)| natord::compare(a, b));

        let mut ret = String::new();
        for (name, value) in encoded {
            if !ret.is_empty() {
                ret.push('&');
            }
            ret.push_str(&name);
            ret.push('=');
            ret.push_str(&value);
        }
        ret
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Params {
            pairs: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// Builds the parameters of a request to `hub`.
///
/// `token` is the verify token of this request, which must not have been sent before.
pub fn build(config: &Config, hub: &HubConfig, mode: Mode, token: &str) -> Params {
    let id = SubscriptionId::new(config.topic_url(), hub.url());
    let preferred = config.get_preferred_verification();

    let mut params = Params::new();
    params.push("hub.mode", mode.as_str());
    params.push("hub.topic", config.topic_url());
    params.push("hub.verify", preferred.as_str());
    params.push("hub.verify", preferred.other().as_str());
    params.push("hub.verify_token", token);
    params.push("hub.callback", callback_url(config, &id));
    if mode == Mode::Subscribe {
        if let Some(lease_seconds) = config.get_lease_seconds() {
            params.push("hub.lease_seconds", lease_seconds.to_string());
        }
    }
    if let Some(secret) = config.secret_for(hub) {
        params.push("hub.secret", secret);
    }

    // Reserved names are rejected by `Config::parameter`, so only extensions are replaced here.
    for (name, value) in config.parameters().iter().chain(hub.parameters()) {
        params.set(name.as_str(), value.as_str());
    }

    params
}

/// The callback URL given to hubs for the subscription `id`.
pub fn callback_url(config: &Config, id: &SubscriptionId) -> String {
    let callback = config.callback_url();
    let key = encode::canonical(id.as_str());
    if config.uses_path_parameter() {
        format!("{}/{}", callback.trim_end_matches('/'), key)
    } else {
        let sep = if callback.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", callback, sep, SUBSCRIPTION_KEY_PARAM, key)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;

    const TOPIC: &str = "http://www.example.com/topic";
    const CALLBACK: &str = "http://www.example.com/callback";
    const HUB: &str = "http://hub.example.com/";

    fn config() -> (Config, HubConfig) {
        let hub = HubConfig::new(HUB).unwrap();
        let config = Config::new(TOPIC, CALLBACK).unwrap().hub(hub.clone());
        (config, hub)
    }

    #[test]
    fn subscribe_body() {
        let (config, hub) = config();
        let config = config.lease_seconds(NonZeroU64::new(2592000));
        let id = SubscriptionId::new(TOPIC, HUB);

        let body = build(&config, &hub, Mode::Subscribe, "abc").to_form_body();
        assert_eq!(
            body,
            format!(
                "hub.callback=http%3A%2F%2Fwww.example.com%2Fcallback%3Fxhub.subscription%3D{}\
                 &hub.lease_seconds=2592000\
                 &hub.mode=subscribe\
                 &hub.topic=http%3A%2F%2Fwww.example.com%2Ftopic\
                 &hub.verify=sync\
                 &hub.verify=async\
                 &hub.verify_token=abc",
                id
            )
        );
    }

    #[test]
    fn path_parameter_without_lease() {
        let (config, hub) = config();
        let config = config
            .use_path_parameter(true)
            .preferred_verification(VerificationMode::Async);
        let id = SubscriptionId::new(TOPIC, HUB);

        let body = build(&config, &hub, Mode::Subscribe, "abc").to_form_body();
        assert_eq!(
            body,
            format!(
                "hub.callback=http%3A%2F%2Fwww.example.com%2Fcallback%2F{}\
                 &hub.mode=subscribe\
                 &hub.topic=http%3A%2F%2Fwww.example.com%2Ftopic\
                 &hub.verify=async\
                 &hub.verify=sync\
                 &hub.verify_token=abc",
                id
            )
        );
    }

    #[test]
    fn unsubscribe_omits_lease() {
        let (config, hub) = config();
        let config = config.lease_seconds(NonZeroU64::new(60));
        let params = build(&config, &hub, Mode::Unsubscribe, "abc");
        assert_eq!(params.get("hub.mode"), Some("unsubscribe"));
        assert_eq!(params.get("hub.lease_seconds"), None);
        assert_eq!(
            params.get_all("hub.verify").collect::<Vec<_>>(),
            ["sync", "async"]
        );
    }

    #[test]
    fn secret_and_extra_parameters() {
        let (config, _) = config();
        let hub = HubConfig::new(HUB)
            .unwrap()
            .secret(Some("hub secret".to_owned()))
            .parameter("extra", "hub")
            .unwrap();
        let config = config
            .secret(Some("global".to_owned()))
            .parameter("extra", "global")
            .unwrap()
            .parameter("global.only", "1")
            .unwrap();

        let params = build(&config, &hub, Mode::Subscribe, "abc");
        assert_eq!(params.get("hub.secret"), Some("hub secret"));
        assert_eq!(params.get("extra"), Some("hub"));
        assert_eq!(params.get_all("extra").count(), 1);
        assert_eq!(params.get("global.only"), Some("1"));
        assert_eq!(params.get("hub.verify_token"), Some("abc"));
    }

    #[test]
    fn callback_with_existing_query() {
        let config = Config::new(TOPIC, "http://www.example.com/callback?app=1").unwrap();
        let id = SubscriptionId::from_key("key");
        assert_eq!(
            callback_url(&config, &id),
            "http://www.example.com/callback?app=1&xhub.subscription=key"
        );

        let config = Config::new(TOPIC, "http://www.example.com/callback/")
            .unwrap()
            .use_path_parameter(true);
        assert_eq!(
            callback_url(&config, &id),
            "http://www.example.com/callback/key"
        );
    }

    #[test]
    fn form_body_ignores_insertion_order() {
        let a = [
            ("hub.mode", "subscribe"),
            ("hub.topic", "http://example.com/~feed"),
            ("hub.verify_token", "t"),
        ];
        let mut b = a;
        b.reverse();
        let a = a.into_iter().collect::<Params>().to_form_body();
        let b = b.into_iter().collect::<Params>().to_form_body();
        assert_eq!(a, b);
        assert_eq!(
            a,
            "hub.mode=subscribe&hub.topic=http%3A%2F%2Fexample.com%2F~feed&hub.verify_token=t"
        );
    }
}
