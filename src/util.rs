macro_rules! serde_delegate {
    (visit_str $($rest:tt)*) => {
        fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
            self.visit_bytes(s.as_bytes())
        }
    };
    (visit_bytes $($rest:tt)*) => {
        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            std::str::from_utf8(v).map_err(E::custom).and_then(|s| self.visit_str(s))
        }
        serde_delegate!($($rest)*);
    };
    () => {};
}

pub mod consts {
    use http::header::HeaderValue;

    // <https://github.com/rust-lang/rust-clippy/issues/5812>
    #[allow(clippy::declare_interior_mutable_const)]
    pub const APPLICATION_WWW_FORM_URLENCODED: HeaderValue =
        HeaderValue::from_static("application/x-www-form-urlencoded");
    pub const HUB_SIGNATURE: &str = "x-hub-signature";
    pub const HUB_ON_BEHALF_OF: &str = "x-hub-on-behalf-of";
    pub const USER_AGENT: &str = concat!("websub-subscriber/", env!("CARGO_PKG_VERSION"));
}

pub mod encode;
pub mod http_service;
pub mod natord;

mod collect_body;

use std::error::Error;
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{de, Deserialize, Serialize};

pub use self::collect_body::{CollectBody, CollectError};
pub use self::http_service::HttpService;

/// An error type that can never be constructed.
///
/// Used as the error type of infallible storages and services.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Never {}

impl Display for Never {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl Error for Never {}

pub fn deserialize_from_str<'de, T, D>(d: D) -> Result<T, D::Error>
where
    T: FromStr,
    D: de::Deserializer<'de>,
{
    struct Visitor<T>(PhantomData<T>);

    impl<'de, T> de::Visitor<'de> for Visitor<T>
    where
        T: FromStr,
    {
        type Value = T;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(std::any::type_name::<T>())
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }

        serde_delegate!(visit_bytes);
    }

    d.deserialize_str(Visitor::<T>(PhantomData))
}

/// Like [`deserialize_from_str`], for fields that are `None` when the key is absent.
///
/// Pair it with `#[serde(default)]`.
pub fn deserialize_some_from_str<'de, T, D>(d: D) -> Result<Option<T>, D::Error>
where
    T: FromStr,
    D: de::Deserializer<'de>,
{
    deserialize_from_str(d).map(Some)
}
