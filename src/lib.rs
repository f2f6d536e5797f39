//! Subscriber side of WebSub (PubSubHubbub 0.3 and 0.4).
//!
//! A [`Notifier`](hub::Notifier) asks hubs to (un)subscribe a callback URL to a topic, keeping a
//! [`SubscriptionRecord`](subscription::SubscriptionRecord) per hub in a [`Storage`](db::Storage).
//! A [`Callback`](callback::Callback) then answers the hubs' verification requests and accepts
//! the content they distribute, either directly or as a `tower_service::Service`.

#![forbid(unsafe_code)]

// `table!` expands to paths under `diesel::`.
#[cfg(feature = "diesel2")]
extern crate diesel2 as diesel;

pub mod callback;
pub mod clock;
pub mod config;
pub mod db;
pub mod hub;
pub mod signature;
pub mod subscription;
pub mod token;

#[cfg(feature = "diesel2")]
mod schema;
mod util;

pub use callback::Callback;
pub use config::{Config, ConfigError, HubConfig};
pub use hub::Notifier;
pub use util::{HttpService, Never};

#[derive(Debug, thiserror::Error)]
pub enum Error<SE> {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("subscription storage failed")]
    Storage(#[source] SE),
}
