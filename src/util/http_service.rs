use std::future::Future;
use std::task::{Context, Poll};

use http::{Request, Response};
use http_body::Body;
use tower::util::Oneshot;
use tower::ServiceExt;
use tower_service::Service;

/// An HTTP client used to reach hubs (like [`hyper::Client`]).
///
/// Any [`tower_service::Service`] from `Request<B>` to `Response<_>` is an `HttpService<B>`. The
/// trait only exists to keep the type parameters of [`Notifier`](crate::hub::Notifier) short.
pub trait HttpService<B>: private::Sealed<B> {
    /// Body of the responses given by the service.
    type ResponseBody: Body;
    type Error;
    type Future: Future<Output = Result<Response<Self::ResponseBody>, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>>;

    fn call(&mut self, request: Request<B>) -> Self::Future;

    /// Waits for the client to be ready, then sends `request` through it.
    fn send(self, request: Request<B>) -> Oneshot<ClientService<Self>, Request<B>>
    where
        Self: Sized,
    {
        ClientService(self).oneshot(request)
    }
}

/// Adapter turning an [`HttpService`] back into a `tower_service::Service`.
#[derive(Clone, Debug)]
pub struct ClientService<S>(S);

impl<S, ReqB, ResB> HttpService<ReqB> for S
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + ?Sized,
    ResB: Body,
{
    type ResponseBody = ResB;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Service::poll_ready(self, cx)
    }

    fn call(&mut self, request: Request<ReqB>) -> S::Future {
        Service::call(self, request)
    }
}

impl<S, ReqB, ResB> private::Sealed<ReqB> for S
where
    S: Service<Request<ReqB>, Response = Response<ResB>> + ?Sized,
    ResB: Body,
{
}

impl<S, B> Service<Request<B>> for ClientService<S>
where
    S: HttpService<B>,
{
    type Response = Response<S::ResponseBody>;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), S::Error>> {
        HttpService::poll_ready(&mut self.0, cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        HttpService::call(&mut self.0, request)
    }
}

mod private {
    pub trait Sealed<B> {}
}
