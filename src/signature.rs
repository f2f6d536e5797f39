use std::fmt::{self, Debug, Formatter};

use hmac::digest::{self, OutputSizeUser};
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Deserialized `X-Hub-Signature` header value.
#[derive(Debug, PartialEq, Eq)]
pub enum Signature {
    Sha1(digest::Output<Sha1>),
}

/// Error while parsing a `Signature`.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Parse,
    UnknownMethod(&'a [u8]),
}

/// Error verifying a signature sent by a hub, indicating that the distributed content has been
/// falsified.
///
/// If you encounter this error, you must not trust the content.
#[derive(thiserror::Error)]
#[error("the hub has sent an invalid signature")]
pub struct SignatureMismatch {
    _priv: (),
}

impl Signature {
    /// Parses a header value of the form `<method>=<hex digest>`.
    pub fn parse(header_value: &[u8]) -> Result<Self, ParseError<'_>> {
        let (method, hex) = if let Some(i) = memchr::memchr(b'=', header_value) {
            let (method, hex) = header_value.split_at(i);
            (method, &hex[1..])
        } else {
            return Err(ParseError::Parse);
        };

        fn decode_hex<T: OutputSizeUser>(hex: &[u8]) -> Result<digest::Output<T>, ParseError<'_>> {
            let mut ret: digest::Output<T> = Default::default();
            if hex::decode_to_slice(hex, &mut ret).is_err() {
                return Err(ParseError::Parse);
            }
            Ok(ret)
        }

        match method {
            b"sha1" => decode_hex::<Sha1>(hex).map(Signature::Sha1),
            _ => Err(ParseError::UnknownMethod(method)),
        }
    }

    /// Computes the signature of `content` keyed with `secret`.
    pub fn sign(secret: &[u8], content: &[u8]) -> Self {
        let mut mac = hmac_sha1(secret);
        mac.update(content);
        Signature::Sha1(mac.finalize().into_bytes())
    }

    /// Checks that this signature is the one of `content` keyed with `secret`.
    ///
    /// The comparison takes constant time with respect to the digest.
    pub fn verify(&self, secret: &[u8], content: &[u8]) -> Result<(), SignatureMismatch> {
        match *self {
            Signature::Sha1(ref signature) => {
                let mut mac = hmac_sha1(secret);
                mac.update(content);
                mac.verify_slice(signature)
                    .map_err(|_| SignatureMismatch { _priv: () })
            }
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Signature::Sha1(ref digest) => write!(f, "sha1={}", hex::encode(digest)),
        }
    }
}

impl Debug for SignatureMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureMismatch").finish()
    }
}

fn hmac_sha1(secret: &[u8]) -> Hmac<Sha1> {
    Hmac::new_from_slice(secret).expect("HMAC accepts keys of any length")
}
