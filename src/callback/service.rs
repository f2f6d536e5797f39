use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::mpsc;
use futures::{ready, Stream};
use http::request::Parts;
use http::{Request, Response, StatusCode};
use hyper::Body;
use pin_project::pin_project;

use crate::clock::{Clock, SystemClock};
use crate::db::Storage;
use crate::util::{CollectBody, CollectError};
use crate::Error;

use super::{Callback, Delivery, Outcome};

/// Default of [`Service::max_body_size`].
pub const DEFAULT_MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// A `tower_service::Service` serving a [`Callback`] over HTTP, e.g. with [`hyper::Server`].
///
/// Content distributed by hubs is forwarded to the [`Updates`] stream returned by
/// [`Service::new`].
pub struct Service<St, C = SystemClock> {
    inner: Arc<Inner<St, C>>,
    max_body_size: usize,
}

/// Stream of content distributed by hubs.
#[derive(Debug)]
pub struct Updates {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

#[pin_project]
pub struct ResponseFuture<B, St, C> {
    #[pin]
    body: CollectBody<B>,
    parts: Option<Parts>,
    inner: Arc<Inner<St, C>>,
}

struct Inner<St, C> {
    callback: Callback<St, C>,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl<St, C> Service<St, C> {
    pub fn new(callback: Callback<St, C>) -> (Self, Updates) {
        let (tx, rx) = mpsc::unbounded();
        let inner = Arc::new(Inner { callback, tx });
        let service = Service {
            inner,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        };
        (service, Updates { rx })
    }

    /// Requests with a body longer than `size` bytes are answered with `413 Payload Too Large`
    /// without being passed to the [`Callback`].
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn callback(&self) -> &Callback<St, C> {
        &self.inner.callback
    }
}

impl<St, C> Inner<St, C>
where
    St: Storage,
    St::Error: Display,
    C: Clock,
{
    fn call(&self, req: Request<bytes::Bytes>) -> Response<Body> {
        let handled = match self.callback.handle(req) {
            Ok(handled) => handled,
            Err(Error::Config(e)) => {
                log::error!("Callback misconfigured: {}", e);
                return status(StatusCode::INTERNAL_SERVER_ERROR);
            }
            Err(Error::Storage(e)) => {
                log::error!("Subscription storage failed: {}", e);
                return status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let (res, outcome) = handled.into_parts();
        if let Outcome::Content(delivery) = outcome {
            if self.tx.unbounded_send(delivery).is_err() {
                log::debug!("Dropping content: `Updates` is gone");
            }
        }

        res.map(Body::from)
    }
}

impl<St, C, B> tower_service::Service<Request<B>> for Service<St, C>
where
    St: Storage,
    St::Error: Display,
    C: Clock,
    B: http_body::Body,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = ResponseFuture<B, St, C>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        log::trace!("Service::call; req.uri()={:?}", req.uri());
        let (parts, body) = req.into_parts();
        ResponseFuture {
            body: CollectBody::with_limit(body, self.max_body_size),
            parts: Some(parts),
            inner: self.inner.clone(),
        }
    }
}

impl<St, C> Clone for Service<St, C> {
    fn clone(&self) -> Self {
        Service {
            inner: self.inner.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

impl<B, St, C> Future for ResponseFuture<B, St, C>
where
    St: Storage,
    St::Error: Display,
    C: Clock,
    B: http_body::Body,
{
    type Output = Result<Response<Body>, Infallible>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let body = match ready!(this.body.poll(cx)) {
            Ok(body) => body,
            Err(CollectError::TooLarge(limit)) => {
                log::warn!("Refusing a request body larger than {} bytes", limit);
                return Poll::Ready(Ok(status(StatusCode::PAYLOAD_TOO_LARGE)));
            }
            Err(CollectError::Body(_)) => {
                log::debug!("Failed to read the request body");
                return Poll::Ready(Ok(status(StatusCode::BAD_REQUEST)));
            }
        };
        let parts = this
            .parts
            .take()
            .expect("`ResponseFuture` polled after completion");

        Poll::Ready(Ok(this.inner.call(Request::from_parts(parts, body))))
    }
}

impl Stream for Updates {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Delivery>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

fn status(status: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = status;
    res
}
