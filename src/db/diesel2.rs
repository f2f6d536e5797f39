//! A [`Storage`] backed by an r2d2 pool of SQLite connections.

use std::fmt::{self, Debug, Formatter};

use diesel2::connection::SimpleConnection;
use diesel2::prelude::*;
use diesel2::r2d2::{self, ConnectionManager, CustomizeConnection, PooledConnection};
use diesel2::SqliteConnection;

use crate::schema::websub_subscriptions as subscriptions;
use crate::subscription::{self, SubscriptionId, SubscriptionRecord, SubscriptionState};
use crate::token::TokenDigest;

use super::Storage;

pub const CREATE_TABLE: &str = "\
    CREATE TABLE IF NOT EXISTS websub_subscriptions (\
        id TEXT PRIMARY KEY NOT NULL,\
        topic_url TEXT NOT NULL,\
        hub_url TEXT NOT NULL,\
        hub_protocol TEXT NOT NULL,\
        created_time BIGINT NOT NULL,\
        lease_seconds BIGINT,\
        verify_token TEXT NOT NULL,\
        secret TEXT,\
        expiration_time BIGINT,\
        subscription_state TEXT NOT NULL\
    );";

#[derive(Clone)]
pub struct Pool {
    inner: r2d2::Pool<ConnectionManager<SqliteConnection>>,
}

/// Connection customizer that creates the subscriptions table on every connection it sees.
///
/// Mostly useful for `:memory:` databases, which start empty on each connection.
#[derive(Debug)]
pub struct CreateTable;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to establish a database connection")]
    Pool(#[from] r2d2::PoolError),
    #[error("database query failed")]
    Query(#[from] diesel2::result::Error),
    #[error("malformed subscription row")]
    Row(#[from] subscription::ParseError),
    #[error("negative timestamp in subscription row")]
    Timestamp,
}

type Row = (
    String,
    String,
    String,
    String,
    i64,
    Option<i64>,
    String,
    Option<String>,
    Option<i64>,
    String,
);

pub fn create_table(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(CREATE_TABLE)
}

impl Pool {
    pub fn new(manager: ConnectionManager<SqliteConnection>) -> Result<Self, r2d2::PoolError> {
        r2d2::Pool::new(manager).map(Pool::from)
    }

    pub fn into_inner(self) -> r2d2::Pool<ConnectionManager<SqliteConnection>> {
        self.inner
    }

    fn get(&self) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, Error> {
        self.inner.get().map_err(Error::Pool)
    }
}

impl From<r2d2::Pool<ConnectionManager<SqliteConnection>>> for Pool {
    fn from(pool: r2d2::Pool<ConnectionManager<SqliteConnection>>) -> Self {
        Pool { inner: pool }
    }
}

impl AsRef<r2d2::Pool<ConnectionManager<SqliteConnection>>> for Pool {
    fn as_ref(&self) -> &r2d2::Pool<ConnectionManager<SqliteConnection>> {
        &self.inner
    }
}

impl Debug for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pool").field(&self.inner.state()).finish()
    }
}

impl Storage for Pool {
    type Error = Error;

    fn has_subscription(&self, id: &SubscriptionId) -> Result<bool, Error> {
        let mut conn = self.get()?;
        diesel2::select(diesel2::dsl::exists(
            subscriptions::table.find(id.as_str()),
        ))
        .get_result(&mut conn)
        .map_err(Error::Query)
    }

    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<SubscriptionRecord>, Error> {
        let mut conn = self.get()?;
        subscriptions::table
            .find(id.as_str())
            .first::<Row>(&mut conn)
            .optional()?
            .map(from_row)
            .transpose()
    }

    fn set_subscription(&self, record: &SubscriptionRecord) -> Result<(), Error> {
        let mut conn = self.get()?;
        diesel2::replace_into(subscriptions::table)
            .values((
                subscriptions::id.eq(record.id.as_str()),
                subscriptions::topic_url.eq(record.topic_url.as_str()),
                subscriptions::hub_url.eq(record.hub_url.as_str()),
                subscriptions::hub_protocol.eq(record.hub_protocol.as_str()),
                subscriptions::created_time.eq(to_sql_time(record.created_time)),
                subscriptions::lease_seconds.eq(record.lease_seconds.map(to_sql_time)),
                subscriptions::verify_token.eq(record.verify_token.as_str()),
                subscriptions::secret.eq(record.secret.as_deref()),
                subscriptions::expiration_time.eq(record.expiration_time.map(to_sql_time)),
                subscriptions::subscription_state.eq(record.subscription_state.as_str()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, Error> {
        let mut conn = self.get()?;
        diesel2::delete(subscriptions::table.find(id.as_str()))
            .execute(&mut conn)
            .map(|n| n != 0)
            .map_err(Error::Query)
    }

    fn transition_subscription(
        &self,
        prior: &SubscriptionRecord,
        next: Option<&SubscriptionRecord>,
    ) -> Result<bool, Error> {
        let mut conn = self.get()?;
        let target = subscriptions::table
            .find(prior.id.as_str())
            .filter(subscriptions::subscription_state.eq(prior.subscription_state.as_str()))
            .filter(subscriptions::verify_token.eq(prior.verify_token.as_str()));

        let n = if let Some(record) = next {
            diesel2::update(target)
                .set((
                    subscriptions::topic_url.eq(record.topic_url.as_str()),
                    subscriptions::hub_url.eq(record.hub_url.as_str()),
                    subscriptions::hub_protocol.eq(record.hub_protocol.as_str()),
                    subscriptions::created_time.eq(to_sql_time(record.created_time)),
                    subscriptions::lease_seconds.eq(record.lease_seconds.map(to_sql_time)),
                    subscriptions::verify_token.eq(record.verify_token.as_str()),
                    subscriptions::secret.eq(record.secret.as_deref()),
                    subscriptions::expiration_time.eq(record.expiration_time.map(to_sql_time)),
                    subscriptions::subscription_state.eq(record.subscription_state.as_str()),
                ))
                .execute(&mut conn)?
        } else {
            diesel2::delete(target).execute(&mut conn)?
        };

        Ok(n != 0)
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for CreateTable {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        create_table(conn).map_err(r2d2::Error::QueryError)
    }
}

fn from_row(row: Row) -> Result<SubscriptionRecord, Error> {
    let (
        id,
        topic_url,
        hub_url,
        hub_protocol,
        created_time,
        lease_seconds,
        verify_token,
        secret,
        expiration_time,
        subscription_state,
    ) = row;

    Ok(SubscriptionRecord {
        id: SubscriptionId::from_key(id),
        topic_url,
        hub_url,
        hub_protocol: hub_protocol.parse()?,
        created_time: from_sql_time(created_time)?,
        lease_seconds: lease_seconds.map(from_sql_time).transpose()?,
        verify_token: TokenDigest::from_hex(verify_token),
        secret,
        expiration_time: expiration_time.map(from_sql_time).transpose()?,
        subscription_state: subscription_state.parse()?,
    })
}

fn to_sql_time(t: u64) -> i64 {
    t.try_into().unwrap_or(i64::MAX)
}

fn from_sql_time(t: i64) -> Result<u64, Error> {
    t.try_into().map_err(|_| Error::Timestamp)
}
