//! Sending (un)subscribe requests to hubs.

pub mod request;

use std::fmt::{self, Debug, Formatter};

use bytes::Bytes;
use http::header::{HeaderMap, CONTENT_TYPE, USER_AGENT};
use http::{Request, StatusCode};
use rand::rngs::OsRng;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ConfigError, HubConfig};
use crate::db::Storage;
use crate::subscription::{SubscriptionId, SubscriptionRecord, SubscriptionState};
use crate::token::VerifyToken;
use crate::util::consts::{self, APPLICATION_WWW_FORM_URLENCODED};
use crate::util::{CollectBody, HttpService};
use crate::Error;

use self::request::Mode;

/// Maximum length of a hub's error response body kept in a [`Report`].
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Sends (un)subscribe requests for one topic to each of its hubs.
pub struct Notifier<S, St, C = SystemClock> {
    config: Config,
    client: S,
    storage: St,
    clock: C,
}

/// Outcome of a [`Notifier::subscribe_all`] or [`Notifier::unsubscribe_all`] call.
#[derive(Debug)]
pub struct Report<E> {
    errors: Vec<HubError<E>>,
    async_hubs: Vec<AsyncHub>,
}

/// A hub that accepted a request but will verify it later (`202 Accepted`).
#[derive(Debug)]
pub struct AsyncHub {
    pub hub: String,
    pub headers: HeaderMap,
}

#[derive(Debug, thiserror::Error)]
#[error("request to hub {hub} failed")]
pub struct HubError<E> {
    pub hub: String,
    #[source]
    pub kind: HubErrorKind<E>,
}

#[derive(Debug, thiserror::Error)]
pub enum HubErrorKind<E> {
    /// The hub responded with a status other than `202 Accepted` or `204 No Content`.
    #[error("hub responded with HTTP status {status}")]
    Status {
        status: StatusCode,
        headers: HeaderMap,
        /// Up to the first 64 KiB of the response body.
        body: Bytes,
    },
    #[error("failed to send the request")]
    Transport(#[source] E),
    #[error("request timed out")]
    Timeout,
}

enum Reply {
    Sync,
    Async(HeaderMap),
    Status(StatusCode, HeaderMap, Bytes),
}

impl<S, St> Notifier<S, St> {
    pub fn new(config: Config, client: S, storage: St) -> Self {
        Notifier {
            config,
            client,
            storage,
            clock: SystemClock,
        }
    }
}

impl<S, St, C> Notifier<S, St, C> {
    /// Replaces the source of the current time, used for `created_time` and lease arithmetic.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Notifier<S, St, C2> {
        Notifier {
            config: self.config,
            client: self.client,
            storage: self.storage,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &St {
        &self.storage
    }
}

impl<S, St, C> Notifier<S, St, C>
where
    St: Storage,
    C: Clock,
{
    /// Asks every configured hub to subscribe the callback to the topic.
    ///
    /// A failure at one hub doesn't prevent requests to the others. Hub failures are collected in
    /// the returned [`Report`], while an `Err` means that the configuration or the storage failed.
    pub async fn subscribe_all<B>(
        &self,
    ) -> Result<Report<<S as HttpService<B>>::Error>, Error<St::Error>>
    where
        S: HttpService<B> + Clone,
        B: From<Vec<u8>>,
    {
        self.notify_all(Mode::Subscribe).await
    }

    /// Asks every configured hub to unsubscribe the callback from the topic.
    pub async fn unsubscribe_all<B>(
        &self,
    ) -> Result<Report<<S as HttpService<B>>::Error>, Error<St::Error>>
    where
        S: HttpService<B> + Clone,
        B: From<Vec<u8>>,
    {
        self.notify_all(Mode::Unsubscribe).await
    }

    async fn notify_all<B>(
        &self,
        mode: Mode,
    ) -> Result<Report<<S as HttpService<B>>::Error>, Error<St::Error>>
    where
        S: HttpService<B> + Clone,
        B: From<Vec<u8>>,
    {
        if self.config.hubs().is_empty() {
            return Err(ConfigError::NoHubs.into());
        }

        let mut report = Report {
            errors: Vec::new(),
            async_hubs: Vec::new(),
        };

        for hub in self.config.hubs() {
            let topic = self.config.topic_url();
            let id = SubscriptionId::new(topic, hub.url());
            match mode {
                Mode::Subscribe => {
                    log::info!("Subscribing to topic {} at hub {} ({})", topic, hub.url(), id)
                }
                Mode::Unsubscribe => log::info!(
                    "Unsubscribing from topic {} at hub {} ({})",
                    topic,
                    hub.url(),
                    id
                ),
            }

            let token = VerifyToken::generate(OsRng);
            let params = request::build(&self.config, hub, mode, token.as_str());
            let record = self.write_ahead(&id, hub, mode, &token)?;
            self.storage
                .set_subscription(&record)
                .map_err(Error::Storage)?;

            let req = self.request(hub, params.to_form_body());
            let reply =
                tokio::time::timeout(self.config.get_timeout(), self.send(req)).await;

            let kind = match reply {
                Ok(Ok(Reply::Sync)) => continue,
                Ok(Ok(Reply::Async(headers))) => {
                    log::info!("Hub {} will verify {} asynchronously", hub.url(), id);
                    report.async_hubs.push(AsyncHub {
                        hub: hub.url().to_owned(),
                        headers,
                    });
                    continue;
                }
                Ok(Ok(Reply::Status(status, headers, body))) => {
                    log::warn!(
                        "Topic {} at hub {} returned HTTP status code {}",
                        topic,
                        hub.url(),
                        status
                    );
                    HubErrorKind::Status {
                        status,
                        headers,
                        body,
                    }
                }
                Ok(Err(e)) => {
                    log::warn!("Request to hub {} for topic {} failed", hub.url(), topic);
                    HubErrorKind::Transport(e)
                }
                Err(_) => {
                    log::warn!("Request to hub {} for topic {} timed out", hub.url(), topic);
                    HubErrorKind::Timeout
                }
            };
            report.errors.push(HubError {
                hub: hub.url().to_owned(),
                kind,
            });
        }

        Ok(report)
    }

    /// The record to persist before sending a request, so that a confirmation arriving at any
    /// time afterwards can be resolved.
    fn write_ahead(
        &self,
        id: &SubscriptionId,
        hub: &HubConfig,
        mode: Mode,
        token: &VerifyToken,
    ) -> Result<SubscriptionRecord, Error<St::Error>> {
        let existing = self.storage.get_subscription(id).map_err(Error::Storage)?;
        let now = self.clock.now();
        let secret = self.config.secret_for(hub).map(str::to_owned);

        let record = match (mode, existing) {
            // Renewal of an active subscription: it stays active until the hub confirms.
            (Mode::Subscribe, Some(existing))
                if existing.subscription_state == SubscriptionState::Verified =>
            {
                SubscriptionRecord {
                    hub_protocol: hub.get_protocol(),
                    verify_token: token.digest(),
                    secret,
                    ..existing
                }
            }
            (Mode::Subscribe, existing) => {
                let created_time = existing.map_or(now, |r| r.created_time);
                let lease_seconds = self.config.get_lease_seconds().map(|l| l.get());
                SubscriptionRecord {
                    id: id.clone(),
                    topic_url: self.config.topic_url().to_owned(),
                    hub_url: hub.url().to_owned(),
                    hub_protocol: hub.get_protocol(),
                    created_time,
                    lease_seconds,
                    verify_token: token.digest(),
                    secret,
                    expiration_time: lease_seconds.map(|l| created_time.saturating_add(l)),
                    subscription_state: SubscriptionState::NotVerified,
                }
            }
            (Mode::Unsubscribe, Some(existing)) => SubscriptionRecord {
                hub_protocol: hub.get_protocol(),
                verify_token: token.digest(),
                subscription_state: SubscriptionState::ToDelete,
                ..existing
            },
            (Mode::Unsubscribe, None) => SubscriptionRecord {
                id: id.clone(),
                topic_url: self.config.topic_url().to_owned(),
                hub_url: hub.url().to_owned(),
                hub_protocol: hub.get_protocol(),
                created_time: now,
                lease_seconds: None,
                verify_token: token.digest(),
                secret,
                expiration_time: None,
                subscription_state: SubscriptionState::ToDelete,
            },
        };

        Ok(record)
    }

    fn request<B: From<Vec<u8>>>(&self, hub: &HubConfig, body: String) -> Request<B> {
        let mut req = Request::post(hub.url())
            .header(CONTENT_TYPE, APPLICATION_WWW_FORM_URLENCODED)
            .header(USER_AGENT, consts::USER_AGENT)
            .body(B::from(body.into_bytes()))
            .expect("hub URLs are validated by `HubConfig::new`");
        let headers = req.headers_mut();
        headers.extend(self.config.headers().clone());
        headers.extend(hub.headers().clone());
        req
    }

    async fn send<B>(&self, req: Request<B>) -> Result<Reply, <S as HttpService<B>>::Error>
    where
        S: HttpService<B> + Clone,
    {
        let res = self.client.clone().send(req).await?;
        let (parts, body) = res.into_parts();
        match parts.status {
            StatusCode::NO_CONTENT => Ok(Reply::Sync),
            StatusCode::ACCEPTED => Ok(Reply::Async(parts.headers)),
            status => {
                let body = match CollectBody::truncated(body, MAX_ERROR_BODY).await {
                    Ok(body) => body,
                    Err(_) => {
                        log::debug!("Failed to read the error response body of status {}", status);
                        Bytes::new()
                    }
                };
                Ok(Reply::Status(status, parts.headers, body))
            }
        }
    }
}

impl<E> Report<E> {
    /// Whether every hub accepted the request.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[HubError<E>] {
        &self.errors
    }

    /// Hubs that will verify the request asynchronously. Their records are already in place
    /// for the later confirmation.
    pub fn async_hubs(&self) -> &[AsyncHub] {
        &self.async_hubs
    }

    pub fn into_errors(self) -> Vec<HubError<E>> {
        self.errors
    }
}

impl<S, St: Debug, C> Debug for Notifier<S, St, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
