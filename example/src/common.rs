use std::fs;
use std::num::NonZeroU64;
use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection};
use diesel::SqliteConnection;
use hyper::client::{Client, HttpConnector};
use hyper_tls::HttpsConnector;
use websub_subscriber::db::diesel2::{self, Pool};
use websub_subscriber::hub::request::VerificationMode;
use websub_subscriber::hub::Report;
use websub_subscriber::subscription::ProtocolVersion;
use websub_subscriber::{Config, HubConfig};

pub struct RmGuard<P: AsRef<Path>>(pub P);

#[derive(Debug)]
struct ConnectionCustomizer;

/// Options shared by `subscribe` and `unsubscribe`.
#[derive(clap::Args)]
pub struct SubscriptionOpt {
    callback: String,
    topic: String,
    #[arg(required = true)]
    hubs: Vec<String>,
    /// Protocol version spoken by the hubs.
    #[arg(long, default_value = "0.3")]
    protocol: ProtocolVersion,
    /// Requested lease duration.
    #[arg(long)]
    lease_seconds: Option<NonZeroU64>,
    /// Secret for signing distributed content.
    #[arg(long)]
    secret: Option<String>,
    /// Prefer asynchronous verification.
    #[arg(long)]
    prefer_async: bool,
    /// Put the subscription id in the callback path instead of the query.
    #[arg(long)]
    path_parameter: bool,
}

const DB_URL: &str = "websub.sqlite3";

impl<P: AsRef<Path>> Drop for RmGuard<P> {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        on_acquire(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

impl SubscriptionOpt {
    pub fn config(self) -> anyhow::Result<Config> {
        let verification = if self.prefer_async {
            VerificationMode::Async
        } else {
            VerificationMode::Sync
        };
        let mut config = Config::new(self.topic, self.callback)?
            .lease_seconds(self.lease_seconds)
            .secret(self.secret)
            .preferred_verification(verification)
            .use_path_parameter(self.path_parameter);
        for hub in self.hubs {
            config = config.hub(HubConfig::new(hub)?.protocol(self.protocol));
        }
        Ok(config)
    }
}

pub fn database_pool() -> anyhow::Result<Pool> {
    let ret = diesel::r2d2::Pool::builder()
        .connection_customizer(Box::new(ConnectionCustomizer))
        .build(ConnectionManager::new(DB_URL))?;
    Ok(ret.into())
}

pub fn http_client() -> Client<HttpsConnector<HttpConnector>> {
    Client::builder().build(HttpsConnector::new())
}

pub fn print_report<E: std::fmt::Display>(report: &Report<E>) {
    for hub in report.async_hubs() {
        println!("{}: will verify asynchronously", hub.hub);
    }
    for error in report.errors() {
        println!("{}: {}", error.hub, error.kind);
    }
    if report.is_success() {
        println!("All hubs accepted the request");
    }
}

fn on_acquire(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
    // The value of `5000` ms is taken from `rusqlite`'s default.
    // <https://github.com/diesel-rs/diesel/issues/2365#issuecomment-719467312>
    conn.batch_execute(
        "\
        PRAGMA busy_timeout=5000;\
        PRAGMA journal_mode=WAL;\
        ",
    )?;
    diesel2::create_table(conn)
}
