//! Rental lookups against PostgreSQL.

use crate::{
    db::{PgConnectionManager, PgPool},
    models::Rental,
    query::{self, BindParam, FilterClauses, FilterError, SELECT_RENTALS},
};
use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_query;
use diesel::sql_types::{Float8, Int8};
use diesel_async::RunQueryDsl;
use once_cell::sync::Lazy;
use std::error::Error as StdError;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_postgres::{Client, SimpleQueryMessage, Statement};
use tracing::{debug, info};

static SELECT_RENTAL_BY_ID: Lazy<String> =
    Lazy::new(|| format!("{SELECT_RENTALS} WHERE r.id = $1"));

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("rental not found")]
    NotFound,

    #[error("failed to acquire database connection: {0}")]
    Pool(String),

    #[error("failed to prepare rental by id statement")]
    Prepare(#[source] tokio_postgres::Error),

    #[error("failed to execute rentals query")]
    Query(#[source] BoxError),

    #[error("failed to scan rental row")]
    Scan(#[source] BoxError),

    #[error("failed to release prepared statements")]
    Release(#[source] anyhow::Error),

    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    #[error("rental repository is closed")]
    Closed,
}

impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error;

        match err {
            Error::NotFound => Self::NotFound,
            Error::DeserializationError(source) => Self::Scan(source),
            other => Self::Query(Box::new(other)),
        }
    }
}

/// Read access to the rentals catalog.
#[async_trait]
pub trait RentalStore: Send + Sync {
    async fn retrieve_rental_by_id(&self, id: i32) -> Result<Rental, RepositoryError>;

    /// Returns every rental matching `clauses`, in statement order. No match
    /// yields an empty vector.
    async fn retrieve_rentals(&self, clauses: &FilterClauses)
        -> Result<Vec<Rental>, RepositoryError>;

    /// Releases the prepared by-id statement. Only the first call does any
    /// work.
    async fn close(&self) -> Result<(), RepositoryError>;
}

/// Rentals over PostgreSQL.
///
/// Listings run on pooled connections. The by-id lookup runs a single
/// statement prepared once on a dedicated session; `None` means the
/// repository has been closed.
pub struct PgRentalRepository {
    pool: PgPool,
    session: Client,
    by_id: RwLock<Option<Statement>>,
}

impl PgRentalRepository {
    /// Prepares the by-id lookup on `session`. The session stays owned by the
    /// repository for its whole lifetime.
    pub async fn new(pool: PgPool, session: Client) -> Result<Self, RepositoryError> {
        let by_id = session
            .prepare(SELECT_RENTAL_BY_ID.as_str())
            .await
            .map_err(RepositoryError::Prepare)?;
        info!("prepared rental by id statement");

        Ok(Self {
            pool,
            session,
            by_id: RwLock::new(Some(by_id)),
        })
    }

    /// SQL text of every statement currently prepared on the lookup session.
    pub async fn prepared_statements(&self) -> Result<Vec<String>, RepositoryError> {
        let messages = self
            .session
            .simple_query("SELECT statement FROM pg_prepared_statements")
            .await
            .map_err(|err| RepositoryError::Query(Box::new(err)))?;

        Ok(messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => row.get(0).map(str::to_owned),
                _ => None,
            })
            .collect())
    }

    async fn ensure_open(&self) -> Result<(), RepositoryError> {
        if self.by_id.read().await.is_none() {
            return Err(RepositoryError::Closed);
        }
        Ok(())
    }

    async fn connection(
        &self,
    ) -> Result<bb8::PooledConnection<'_, PgConnectionManager>, RepositoryError> {
        self.pool
            .get()
            .await
            .map_err(|err| RepositoryError::Pool(format!("{err:?}")))
    }
}

#[async_trait]
impl RentalStore for PgRentalRepository {
    async fn retrieve_rental_by_id(&self, id: i32) -> Result<Rental, RepositoryError> {
        // Held for the whole lookup so close waits for in-flight executions.
        let by_id = self.by_id.read().await;
        let statement = by_id.as_ref().ok_or(RepositoryError::Closed)?;

        let row = self
            .session
            .query_opt(statement, &[&id])
            .await
            .map_err(|err| RepositoryError::Query(Box::new(err)))?
            .ok_or(RepositoryError::NotFound)?;

        Rental::try_from(&row).map_err(|err| RepositoryError::Scan(Box::new(err)))
    }

    async fn retrieve_rentals(
        &self,
        clauses: &FilterClauses,
    ) -> Result<Vec<Rental>, RepositoryError> {
        self.ensure_open().await?;
        let built = query::build_query(SELECT_RENTALS, clauses)?;
        debug!(sql = %built.sql, params = ?built.params, "retrieving rentals");

        let mut statement = sql_query(built.sql).into_boxed::<Pg>();
        for param in built.params {
            statement = bind_param(statement, param);
        }

        let mut conn = self.connection().await?;
        let rentals = statement.load::<Rental>(&mut *conn).await?;
        Ok(rentals)
    }

    async fn close(&self) -> Result<(), RepositoryError> {
        let taken = self.by_id.write().await.take();
        let Some(statement) = taken else {
            return Ok(());
        };

        // Dropping the last handle queues the protocol-level Close ahead of
        // the next request on the session.
        drop(statement);
        let remaining = self
            .prepared_statements()
            .await
            .map_err(|err| RepositoryError::Release(err.into()))?;
        if remaining
            .iter()
            .any(|sql| sql.as_str() == SELECT_RENTAL_BY_ID.as_str())
        {
            return Err(RepositoryError::Release(anyhow::anyhow!(
                "rental by id statement is still prepared"
            )));
        }

        info!("released rental by id statement");
        Ok(())
    }
}

fn bind_param<'a>(
    query: BoxedSqlQuery<'a, Pg, SqlQuery>,
    param: BindParam,
) -> BoxedSqlQuery<'a, Pg, SqlQuery> {
    match param {
        BindParam::Int(value) => query.bind::<Int8, _>(value),
        BindParam::Float(value) => query.bind::<Float8, _>(value),
    }
}
