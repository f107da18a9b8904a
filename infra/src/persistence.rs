//! PostgreSQL access for the catalog.
//!
//! Connections come out of an r2d2 pool managed by
//! [`CatalogConnectionManager`]. Every unit of work runs inside a
//! [`Transaction`] obtained from [`Catalog::begin`]; dropping it without
//! calling `commit` rolls it back.

use std::fmt;
use std::time::Duration;

use err_derive::Error;
use log::*;
use postgres::error::UNIQUE_VIOLATION;
use postgres::rows::{Row, Rows};
use postgres::types::FromSql;
use r2d2::ManageConnection;
use r2d2_postgres::{PostgresConnectionManager, TlsMode};

pub use postgres::transaction::Transaction;

const SETUP_SQL: &str = include_str!("schema.sql");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(display = "database error: {}", _0)]
    Postgres(#[error(source)] postgres::Error),
    #[error(display = "connection pool error: {}", _0)]
    Pool(#[error(source)] r2d2::Error),
    #[error(display = "missing column {} in row", _0)]
    MissingColumn(usize),
    #[error(display = "statement returned no row")]
    MissingRow,
    #[error(display = "malformed json column: {}", _0)]
    MalformedColumn(#[error(source)] serde_json::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Postgres(e) => e.code() == Some(&UNIQUE_VIOLATION),
            _ => false,
        }
    }
}

/// A pooled connection to the catalog database.
pub struct Catalog {
    connection: postgres::Connection,
    statement_timeout: Option<Duration>,
}

impl Catalog {
    pub fn wrap(connection: postgres::Connection, statement_timeout: Option<Duration>) -> Self {
        Catalog {
            connection,
            statement_timeout,
        }
    }

    pub fn get_ref(&self) -> &postgres::Connection {
        &self.connection
    }

    /// Creates the catalog tables if they are missing.
    pub fn setup(&self) -> Result<(), StoreError> {
        debug!("Init schema");
        self.connection
            .batch_execute(SETUP_SQL)
            .map_err(StoreError::Postgres)
    }

    /// Opens a transaction scoped to one request. The statement timeout is
    /// set with `SET LOCAL`, so it ends with the transaction.
    pub fn begin(&self) -> Result<Transaction<'_>, StoreError> {
        let t = self.connection.transaction().map_err(StoreError::Postgres)?;
        if let Some(timeout) = self.statement_timeout {
            let millis = timeout.as_millis();
            trace!("statement_timeout = {}ms", millis);
            t.batch_execute(&format!("SET LOCAL statement_timeout = {}", millis))
                .map_err(StoreError::Postgres)?;
        }
        Ok(t)
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Catalog")
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

#[derive(Debug)]
pub struct CatalogConnectionManager {
    inner: PostgresConnectionManager,
    statement_timeout: Option<Duration>,
}

impl CatalogConnectionManager {
    pub fn new(url: &str, statement_timeout: Option<Duration>) -> Result<Self, StoreError> {
        let inner =
            PostgresConnectionManager::new(url, TlsMode::None).map_err(StoreError::Postgres)?;
        Ok(CatalogConnectionManager {
            inner,
            statement_timeout,
        })
    }
}

impl ManageConnection for CatalogConnectionManager {
    type Connection = Catalog;
    type Error = postgres::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let connection = self.inner.connect()?;
        Ok(Catalog::wrap(connection, self.statement_timeout))
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        self.inner.is_valid(&mut conn.connection)
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.inner.has_broken(&mut conn.connection)
    }
}

/// Reads one column, turning a missing or mistyped column into an error
/// rather than a panic.
pub fn column<T: FromSql>(row: &Row, idx: usize) -> Result<T, StoreError> {
    row.get_opt(idx)
        .ok_or(StoreError::MissingColumn(idx))?
        .map_err(StoreError::Postgres)
}

/// The first row of a statement that must return one.
pub fn first_row<'a>(rows: &'a Rows) -> Result<Row<'a>, StoreError> {
    rows.iter().next().ok_or(StoreError::MissingRow)
}

/// Reads a `json` column and decodes it into `T`.
pub fn json_column<T: serde::de::DeserializeOwned>(
    row: &Row,
    idx: usize,
) -> Result<T, StoreError> {
    let value: serde_json::Value = column(row, idx)?;
    serde_json::from_value(value).map_err(StoreError::MalformedColumn)
}
