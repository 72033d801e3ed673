//! PostgreSQL-based row backend.
//!
//! Available behind the `postgres` feature; without it a stub type is
//! exported whose operations return [`Error::NotImplemented`](crate::Error).

#[cfg(feature = "postgres")]
mod implementation {
    use crate::storage::metrics::record_operation_metrics;
    use crate::storage::traits::{Row, RowBackend, validate_table_name};
    use crate::{Error, Result};
    use deadpool_postgres::{Config, Pool, Runtime};
    use std::time::Instant;
    use tokio::runtime::Handle;
    use tokio_postgres::NoTls;

    /// PostgreSQL-based row backend.
    ///
    /// Holds a bounded `deadpool` connection pool. The trait methods are
    /// synchronous, so each call bridges onto the pool via the ambient tokio
    /// runtime when one exists, or a private current-thread runtime
    /// otherwise. Do not call them from an async runtime worker thread
    /// directly; use `tokio::task::spawn_blocking` there.
    pub struct PostgresBackend {
        /// Connection pool.
        pool: Pool,
        /// Table holding the `(key, value)` rows.
        table: String,
    }

    /// Helper to map pool errors.
    fn pool_error(e: impl std::fmt::Display) -> Error {
        Error::BackendUnavailable {
            backend: "postgres".to_string(),
            cause: e.to_string(),
        }
    }

    /// Helper to map query errors.
    fn query_error(op: &str, e: impl std::fmt::Display) -> Error {
        Error::QueryFailed {
            operation: op.to_string(),
            cause: e.to_string(),
        }
    }

    impl PostgresBackend {
        /// Default maximum connections in pool.
        const DEFAULT_POOL_MAX_SIZE: usize = 20;

        /// Creates a new PostgreSQL backend.
        ///
        /// # Errors
        ///
        /// Returns an error if the table name is invalid or the connection
        /// pool fails to initialize.
        pub fn new(connection_url: &str, table: impl Into<String>) -> Result<Self> {
            Self::with_pool_size(connection_url, table, None)
        }

        /// Creates a new PostgreSQL backend with configurable pool size.
        ///
        /// # Arguments
        ///
        /// * `connection_url` - PostgreSQL connection URL
        /// * `table` - Name of the document table
        /// * `pool_max_size` - Maximum connections in pool (defaults to 20)
        ///
        /// # Errors
        ///
        /// Returns an error if the table name is invalid or the connection
        /// pool fails to initialize.
        pub fn with_pool_size(
            connection_url: &str,
            table: impl Into<String>,
            pool_max_size: Option<usize>,
        ) -> Result<Self> {
            let table = table.into();
            validate_table_name(&table)?;

            let config = Self::parse_connection_url(connection_url)?;
            let cfg = Self::build_pool_config(&config, pool_max_size);

            let pool = cfg
                .create_pool(Some(Runtime::Tokio1), NoTls)
                .map_err(pool_error)?;

            Ok(Self { pool, table })
        }

        /// Parses the connection URL into a tokio-postgres config.
        fn parse_connection_url(url: &str) -> Result<tokio_postgres::Config> {
            url.parse::<tokio_postgres::Config>()
                .map_err(|e| Error::BackendUnavailable {
                    backend: "postgres".to_string(),
                    cause: format!("invalid connection URL: {e}"),
                })
        }

        /// Extracts host string from tokio-postgres Host.
        #[cfg(unix)]
        fn host_to_string(h: &tokio_postgres::config::Host) -> String {
            match h {
                tokio_postgres::config::Host::Tcp(s) => s.clone(),
                tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
            }
        }

        /// Extracts host string from tokio-postgres Host (Windows: Tcp only).
        #[cfg(not(unix))]
        fn host_to_string(h: &tokio_postgres::config::Host) -> String {
            let tokio_postgres::config::Host::Tcp(s) = h;
            s.clone()
        }

        /// Builds a deadpool config from a tokio-postgres config.
        ///
        /// Bounded pool with 5 second acquire/create/recycle timeouts so a
        /// saturated pool fails fast instead of hanging callers.
        fn build_pool_config(
            config: &tokio_postgres::Config,
            pool_max_size: Option<usize>,
        ) -> Config {
            let mut cfg = Config::new();
            cfg.host = config.get_hosts().first().map(Self::host_to_string);
            cfg.port = config.get_ports().first().copied();
            cfg.user = config.get_user().map(String::from);
            cfg.password = config
                .get_password()
                .map(|p| String::from_utf8_lossy(p).to_string());
            cfg.dbname = config.get_dbname().map(String::from);

            let max_size = pool_max_size.unwrap_or(Self::DEFAULT_POOL_MAX_SIZE);
            cfg.pool = Some(deadpool_postgres::PoolConfig {
                max_size,
                timeouts: deadpool_postgres::Timeouts {
                    wait: Some(std::time::Duration::from_secs(5)),
                    create: Some(std::time::Duration::from_secs(5)),
                    recycle: Some(std::time::Duration::from_secs(5)),
                },
                ..Default::default()
            });

            cfg.manager = Some(deadpool_postgres::ManagerConfig {
                recycling_method: deadpool_postgres::RecyclingMethod::Fast,
            });

            cfg
        }

        /// Returns the table name.
        #[must_use]
        pub fn table(&self) -> &str {
            &self.table
        }

        /// Runs a blocking operation on the async pool.
        ///
        /// Must not be called from inside an async runtime worker thread:
        /// `Handle::block_on` panics when it would block an async context.
        /// The trait methods are sync and intended for sync callers (CLI,
        /// blocking services); from async code, spawn the store onto a
        /// blocking thread (e.g. `tokio::task::spawn_blocking`) instead.
        fn block_on<F, T>(&self, f: F) -> Result<T>
        where
            F: std::future::Future<Output = Result<T>>,
        {
            if let Ok(handle) = Handle::try_current() {
                handle.block_on(f)
            } else {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| Error::BackendUnavailable {
                        backend: "postgres".to_string(),
                        cause: format!("failed to create runtime: {e}"),
                    })?;
                rt.block_on(f)
            }
        }

        /// Async implementation of `ensure_table`.
        async fn ensure_table_async(&self) -> Result<()> {
            let client = self.pool.get().await.map_err(pool_error)?;

            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )",
                self.table
            );

            client
                .batch_execute(&ddl)
                .await
                .map_err(|e| query_error("create_table", e))?;

            Ok(())
        }

        /// Async implementation of `fetch_all`.
        async fn fetch_all_async(&self) -> Result<Vec<Row>> {
            let client = self.pool.get().await.map_err(pool_error)?;

            let query = format!("SELECT key, value FROM {}", self.table);
            let rows = client
                .query(&query, &[])
                .await
                .map_err(|e| query_error("fetch_all", e))?;

            Ok(rows
                .iter()
                .map(|row| Row {
                    key: row.get(0),
                    value: row.get(1),
                })
                .collect())
        }

        /// Async implementation of `fetch`.
        async fn fetch_async(&self, key: &str) -> Result<Option<Row>> {
            let client = self.pool.get().await.map_err(pool_error)?;

            let query = format!("SELECT key, value FROM {} WHERE key = $1", self.table);
            let row = client
                .query_opt(&query, &[&key])
                .await
                .map_err(|e| query_error("fetch", e))?;

            Ok(row.map(|r| Row {
                key: r.get(0),
                value: r.get(1),
            }))
        }

        /// Async implementation of `upsert`.
        async fn upsert_async(&self, key: &str, value: &str) -> Result<()> {
            let client = self.pool.get().await.map_err(pool_error)?;

            let upsert = format!(
                "INSERT INTO {} (key, value) VALUES ($1, $2)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
                self.table
            );

            client
                .execute(&upsert, &[&key, &value])
                .await
                .map_err(|e| query_error("upsert", e))?;

            Ok(())
        }

        /// Async implementation of `delete`.
        async fn delete_async(&self, key: &str) -> Result<bool> {
            let client = self.pool.get().await.map_err(pool_error)?;

            let delete = format!("DELETE FROM {} WHERE key = $1", self.table);
            let rows = client
                .execute(&delete, &[&key])
                .await
                .map_err(|e| query_error("delete", e))?;

            Ok(rows > 0)
        }
    }

    impl RowBackend for PostgresBackend {
        fn ensure_table(&self) -> Result<()> {
            let start = Instant::now();
            let result = self.block_on(self.ensure_table_async());
            let status = if result.is_ok() { "success" } else { "error" };
            record_operation_metrics("postgres", "ensure_table", start, status);
            result
        }

        fn fetch_all(&self) -> Result<Vec<Row>> {
            let start = Instant::now();
            let result = self.block_on(self.fetch_all_async());
            let status = if result.is_ok() { "success" } else { "error" };
            record_operation_metrics("postgres", "fetch_all", start, status);
            result
        }

        fn fetch(&self, key: &str) -> Result<Option<Row>> {
            let start = Instant::now();
            let result = self.block_on(self.fetch_async(key));
            let status = if result.is_ok() { "success" } else { "error" };
            record_operation_metrics("postgres", "fetch", start, status);
            result
        }

        fn upsert(&self, key: &str, value: &str) -> Result<()> {
            let start = Instant::now();
            let result = self.block_on(self.upsert_async(key, value));
            let status = if result.is_ok() { "success" } else { "error" };
            record_operation_metrics("postgres", "upsert", start, status);
            result
        }

        fn delete(&self, key: &str) -> Result<bool> {
            let start = Instant::now();
            let result = self.block_on(self.delete_async(key));
            let status = if result.is_ok() { "success" } else { "error" };
            record_operation_metrics("postgres", "delete", start, status);
            result
        }
    }
}

#[cfg(feature = "postgres")]
pub use implementation::PostgresBackend;

#[cfg(not(feature = "postgres"))]
mod stub {
    use crate::storage::traits::{Row, RowBackend};
    use crate::{Error, Result};

    /// Stub PostgreSQL backend when the feature is not enabled.
    pub struct PostgresBackend {
        connection_url: String,
        table: String,
    }

    impl PostgresBackend {
        /// Creates a new PostgreSQL backend (stub).
        ///
        /// # Errors
        ///
        /// Never fails; the stub defers failure to the trait methods.
        pub fn new(connection_url: impl Into<String>, table: impl Into<String>) -> Result<Self> {
            Ok(Self {
                connection_url: connection_url.into(),
                table: table.into(),
            })
        }

        /// Creates a new PostgreSQL backend with configurable pool size (stub).
        ///
        /// The pool size is ignored in the stub - requires the `postgres`
        /// feature.
        ///
        /// # Errors
        ///
        /// Never fails; the stub defers failure to the trait methods.
        pub fn with_pool_size(
            connection_url: impl Into<String>,
            table: impl Into<String>,
            _pool_max_size: Option<usize>,
        ) -> Result<Self> {
            Self::new(connection_url, table)
        }

        fn not_implemented(&self, op: &str) -> Error {
            Error::NotImplemented(format!(
                "PostgresBackend::{op} on {} at {} (compile with --features postgres)",
                self.table, self.connection_url
            ))
        }
    }

    impl RowBackend for PostgresBackend {
        fn ensure_table(&self) -> Result<()> {
            Err(self.not_implemented("ensure_table"))
        }

        fn fetch_all(&self) -> Result<Vec<Row>> {
            Err(self.not_implemented("fetch_all"))
        }

        fn fetch(&self, _key: &str) -> Result<Option<Row>> {
            Err(self.not_implemented("fetch"))
        }

        fn upsert(&self, _key: &str, _value: &str) -> Result<()> {
            Err(self.not_implemented("upsert"))
        }

        fn delete(&self, _key: &str) -> Result<bool> {
            Err(self.not_implemented("delete"))
        }
    }
}

#[cfg(not(feature = "postgres"))]
pub use stub::PostgresBackend;
