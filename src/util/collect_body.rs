use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BufMut, Bytes};
use futures::{ready, Future};
use http_body::Body;
use pin_project::pin_project;

/// A future that reads an HTTP body to end, optionally refusing bodies longer than a limit.
#[pin_project]
pub struct CollectBody<B> {
    #[pin]
    body: B,
    state: State,
    limit: Option<Limit>,
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError<E> {
    #[error("failed to read body")]
    Body(#[source] E),
    #[error("body exceeds the limit of {0} bytes")]
    TooLarge(usize),
}

#[derive(Clone, Copy)]
enum Limit {
    Reject(usize),
    Truncate(usize),
}

enum State {
    Init,
    Once(Bytes),
    Streaming(Vec<u8>),
}

impl<B: Body> CollectBody<B> {
    pub fn new(body: B) -> Self {
        CollectBody {
            body,
            state: State::Init,
            limit: None,
        }
    }

    /// Fails with `CollectError::TooLarge` if the body exceeds `limit` bytes.
    pub fn with_limit(body: B, limit: usize) -> Self {
        CollectBody {
            body,
            state: State::Init,
            limit: Some(Limit::Reject(limit)),
        }
    }

    /// Stops reading once `limit` bytes are read, yielding only the first `limit` bytes.
    pub fn truncated(body: B, limit: usize) -> Self {
        CollectBody {
            body,
            state: State::Init,
            limit: Some(Limit::Truncate(limit)),
        }
    }
}

impl State {
    fn len(&self) -> usize {
        match *self {
            State::Init => 0,
            State::Once(ref buf) => buf.len(),
            State::Streaming(ref buf) => buf.len(),
        }
    }

    fn push(&mut self, data: Bytes, hint: usize) {
        match *self {
            State::Init => *self = State::Once(data),
            State::Once(ref mut first) => {
                let mut buf = Vec::with_capacity(first.len() + data.len() + hint);
                buf.put(first);
                buf.put(data);
                *self = State::Streaming(buf);
            }
            State::Streaming(ref mut buf) => buf.put(data),
        }
    }
}

impl<B: Body> Future for CollectBody<B> {
    type Output = Result<Bytes, CollectError<B::Error>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        while let Some(mut data) =
            ready!(this.body.as_mut().poll_data(cx)).transpose().map_err(CollectError::Body)?
        {
            match *this.limit {
                Some(Limit::Reject(limit)) if this.state.len() + data.remaining() > limit => {
                    return Poll::Ready(Err(CollectError::TooLarge(limit)));
                }
                Some(Limit::Truncate(limit)) if this.state.len() + data.remaining() >= limit => {
                    let rest = limit - this.state.len();
                    this.state.push(data.copy_to_bytes(rest), 0);
                    break;
                }
                _ => {
                    let hint = this.body.size_hint().lower().try_into().unwrap_or(0);
                    this.state.push(data.copy_to_bytes(data.remaining()), hint);
                }
            }
        }

        match mem::replace(this.state, State::Init) {
            State::Init => Poll::Ready(Ok(Bytes::new())),
            State::Once(buf) => Poll::Ready(Ok(buf)),
            State::Streaming(buf) => Poll::Ready(Ok(buf.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn chunked(chunks: &[&'static str]) -> hyper::Body {
        let chunks = chunks
            .iter()
            .map(|&s| Ok::<_, std::io::Error>(Bytes::from_static(s.as_bytes())))
            .collect::<Vec<_>>();
        hyper::Body::wrap_stream(stream::iter(chunks))
    }

    #[tokio::test]
    async fn collects_chunks() {
        let body = CollectBody::new(chunked(&["<feed", ">", "</feed>"]))
            .await
            .unwrap();
        assert_eq!(body, "<feed></feed>");
    }

    #[tokio::test]
    async fn empty_body() {
        let body = CollectBody::new(hyper::Body::empty()).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn limit() {
        let body = CollectBody::with_limit(chunked(&["1234", "5678"]), 8)
            .await
            .unwrap();
        assert_eq!(body, "12345678");

        let result = CollectBody::with_limit(chunked(&["1234", "56789"]), 8).await;
        assert!(matches!(result, Err(CollectError::TooLarge(8))));
    }

    #[tokio::test]
    async fn truncate() {
        let body = CollectBody::truncated(chunked(&["1234", "56789", "0"]), 8)
            .await
            .unwrap();
        assert_eq!(body, "12345678");

        let body = CollectBody::truncated(chunked(&["1234"]), 8).await.unwrap();
        assert_eq!(body, "1234");
    }
}
