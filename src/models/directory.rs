use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    Connection, PgConnection, Row,
    postgres::{PgConnectOptions, PgRow},
};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::DirectoryConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CUSTOMER_ID_QUERY: &str =
    "SELECT odoo_customer_id FROM n_central_customers WHERE customername = $1";

/// Outcome of a customer lookup. The three cases mean different things to
/// the caller and are kept apart on purpose.
#[derive(Debug)]
pub enum CustomerLookup {
    Found(i64),
    /// The query ran but no row (or a NULL id) matched the name
    NotFound,
    /// Connecting or querying failed
    Failed(anyhow::Error),
}

/// Maps N-central customer names to helpdesk partner ids.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn lookup(&self, customer_name: &str) -> CustomerLookup;
}

/// Directory backed by the `n_central_customers` table. A fresh connection is
/// opened for every lookup and closed right after.
pub struct PgDirectory {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgDirectory {
    pub fn new(config: &DirectoryConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password);

        Self {
            options,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn query_customer_id(&self, customer_name: &str) -> anyhow::Result<Option<i64>> {
        let mut conn = tokio::time::timeout(
            self.connect_timeout,
            PgConnection::connect_with(&self.options),
        )
        .await
        .context("timed out connecting to customer directory")?
        .context("failed to connect to customer directory")?;

        let row = sqlx::query(CUSTOMER_ID_QUERY)
            .bind(customer_name)
            .fetch_optional(&mut conn)
            .await
            .context("customer id query failed")?;

        let customer_id =
            customer_id(row.as_ref()).context("failed to read odoo_customer_id from row")?;

        if let Err(e) = conn.close().await {
            warn!("failed to close customer directory connection: {}", e);
        }

        Ok(customer_id)
    }
}

/// `None` for no row as well as for a NULL id.
fn customer_id(row: Option<&PgRow>) -> Result<Option<i64>, sqlx::Error> {
    let Some(row) = row else {
        return Ok(None);
    };
    widen_id(row.try_get::<Option<i64>, _>(0), || row.try_get::<Option<i32>, _>(0))
}

// Odoo ids are int4, but the directory table may store them as bigint.
fn widen_id(
    int8: Result<Option<i64>, sqlx::Error>,
    int4: impl FnOnce() -> Result<Option<i32>, sqlx::Error>,
) -> Result<Option<i64>, sqlx::Error> {
    match int8 {
        Ok(id) => Ok(id),
        Err(_) => int4().map(|id| id.map(i64::from)),
    }
}

fn classify(customer_name: &str, result: anyhow::Result<Option<i64>>) -> CustomerLookup {
    match result {
        Ok(Some(id)) => {
            debug!("Customer ID for {}: {}", customer_name, id);
            CustomerLookup::Found(id)
        }
        Ok(None) => {
            debug!("No customer ID found for {}", customer_name);
            CustomerLookup::NotFound
        }
        Err(e) => {
            error!("Database query failed: {:#}", e);
            CustomerLookup::Failed(e)
        }
    }
}

#[async_trait]
impl CustomerDirectory for PgDirectory {
    #[tracing::instrument(skip(self))]
    async fn lookup(&self, customer_name: &str) -> CustomerLookup {
        debug!("Connecting to the database to get customer ID");

        classify(customer_name, self.query_customer_id(customer_name).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> DirectoryConfig {
        DirectoryConfig {
            host: "127.0.0.1".into(),
            // Nothing listens on port 1
            port: 1,
            database: "directory".into(),
            user: "bridge".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn unreachable_database_is_a_failure_not_a_miss() {
        let directory =
            PgDirectory::new(&unreachable_config()).with_connect_timeout(Duration::from_secs(2));

        match directory.lookup("Acme Corp").await {
            CustomerLookup::Failed(e) => {
                assert!(format!("{e:#}").contains("customer directory"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    fn decode_error() -> sqlx::Error {
        sqlx::Error::ColumnNotFound("odoo_customer_id".into())
    }

    #[test]
    fn no_row_means_no_id() {
        assert!(matches!(customer_id(None), Ok(None)));
    }

    #[test]
    fn bigint_id_is_used_as_is() {
        let id = widen_id(Ok(Some(4_000_000_000)), || panic!("int4 decode not needed"));
        assert_eq!(id.unwrap(), Some(4_000_000_000));
    }

    #[test]
    fn int4_id_is_widened() {
        let id = widen_id(Err(decode_error()), || Ok(Some(17)));
        assert_eq!(id.unwrap(), Some(17));
    }

    #[test]
    fn null_id_stays_empty() {
        assert_eq!(widen_id(Ok(None), || Ok(Some(1))).unwrap(), None);
        assert_eq!(widen_id(Err(decode_error()), || Ok(None)).unwrap(), None);
    }

    #[test]
    fn undecodable_id_is_an_error() {
        assert!(widen_id(Err(decode_error()), || Err(decode_error())).is_err());
    }

    #[test]
    fn outcomes_stay_distinct() {
        assert!(matches!(classify("Acme", Ok(Some(7))), CustomerLookup::Found(7)));
        assert!(matches!(classify("Acme", Ok(None)), CustomerLookup::NotFound));
        assert!(matches!(
            classify("Acme", Err(anyhow::anyhow!("connection refused"))),
            CustomerLookup::Failed(_)
        ));
    }

    #[test]
    fn default_connect_timeout_is_ten_seconds() {
        let directory = PgDirectory::new(&unreachable_config());
        assert_eq!(directory.connect_timeout, Duration::from_secs(10));
    }
}
