use std::convert::Infallible;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

use anyhow::Context;
use futures::{Stream, StreamExt, TryStream};
use hyper::server::accept;
use hyper::service::make_service_fn;
use hyper::Uri;
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use websub_subscriber::callback::{Delivery, Service, Updates};
use websub_subscriber::Callback;

#[derive(clap::Args)]
pub struct Opt {
    callback: Uri,
    bind: Option<String>,
}

pub async fn main(opt: Opt) -> anyhow::Result<()> {
    let pool = crate::common::database_pool()?;
    let callback = Callback::new(pool).callback_path(opt.callback.path());
    let (service, updates) = Service::new(callback);
    let _guard;

    if let Some(bind) = opt.bind.as_ref() {
        if let Some(addr) = bind.strip_prefix("tcp://") {
            let addr: SocketAddr = addr.parse()?;
            let listener = TcpListenerStream::new(tokio::net::TcpListener::bind(addr).await?);
            serve(listener, service, updates).await
        } else if let Some(path) = bind.strip_prefix("unix://") {
            let path = Path::new(path);
            let _ = fs::remove_file(path);
            let listener = UnixListenerStream::new(tokio::net::UnixListener::bind(path)?);
            _guard = crate::common::RmGuard(path);
            serve(listener, service, updates).await
        } else {
            anyhow::bail!("unknown bind address type: {}", bind);
        }
    } else {
        let port = if let Some(p) = opt.callback.port_u16() {
            p
        } else {
            match opt.callback.scheme_str() {
                Some("https") => 443,
                Some("http") => 80,
                Some(s) => anyhow::bail!("default port for scheme `{}` is unknown", s),
                None => anyhow::bail!("missing URI scheme for callback argument"),
            }
        };
        let host = opt.callback.host().context("missing host in callback argument")?;
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .context("callback host resolved to no address")?;
        let listener = TcpListenerStream::new(tokio::net::TcpListener::bind(addr).await?);
        serve(listener, service, updates).await
    }
}

async fn serve<I>(
    incoming: I,
    service: Service<websub_subscriber::db::diesel2::Pool>,
    updates: Updates,
) -> anyhow::Result<()>
where
    I: TryStream + Stream<Item = Result<I::Ok, I::Error>> + Send,
    I::Ok: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
    I::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let make_service = make_service_fn(move |_| {
        let service = service.clone();
        async move { Ok::<_, Infallible>(service) }
    });
    let server = hyper::Server::builder(accept::from_stream(incoming))
        .serve(make_service)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        });
    let printer = tokio::spawn(updates.for_each(|delivery| async move { print(&delivery) }));

    server.await?;
    printer.abort();

    Ok(())
}

fn print(delivery: &Delivery) {
    if !delivery.authenticate() {
        println!("Topic {}: discarding content with a bad signature", delivery.topic());
        return;
    }

    let content_type = delivery
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown type");
    println!(
        "Topic {}: {} bytes of {}",
        delivery.topic(),
        delivery.content().len(),
        content_type
    );
    if let Some(feed) = delivery.feed_update() {
        println!("{}", String::from_utf8_lossy(feed));
    }
}
