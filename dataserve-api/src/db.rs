//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the Postgres
//! implementations of the two storage ports:
//!
//! - [`DataSource`]: `data` rows by owner, or the whole table
//! - [`AccessResolver`]: `users.access_level` for one user
//!
//! Every query runs under the caller's [`RequestContext`]. A connection is
//! checked out per call and goes back to the pool when the call's future
//! completes or is dropped on cancellation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dataserve_core::{
    AccessLevel, AccessResolutionError, DataError, OwnerId, Record, RequestContext,
};
use dataserve_storage::{AccessResolver, DataSource};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

use crate::error::{ApiError, ApiResult};
use crate::telemetry::METRICS;

/// Bundled schema, applied by [`DbClient::apply_schema`].
pub const SCHEMA_SQL: &str = include_str!("../migrations/0001_init.sql");

const SELECT_BY_OWNER: &str = "SELECT id, user_id, data FROM data WHERE user_id = $1 ORDER BY id";
const SELECT_ALL: &str = "SELECT id, user_id, data FROM data ORDER BY id";
const SELECT_ACCESS_LEVEL: &str = "SELECT access_level FROM users WHERE id = $1";

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per seeding statement; each row binds two parameters.
pub const INSERT_CHUNK_ROWS: usize = 1_000;

const _: () = assert!(INSERT_CHUNK_ROWS * 2 <= MAX_BIND_PARAMS);

/// `INSERT INTO data (user_id, data) VALUES ($1, $2), ($3, $4), ...` for `rows` rows.
fn insert_records_sql(rows: usize) -> String {
    let mut sql = String::from("INSERT INTO data (user_id, data) VALUES ");
    for i in 0..rows {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&format!("(${}, ${})", i * 2 + 1, i * 2 + 2));
    }
    sql
}

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/connect timeout for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "dataserve".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 10,
            timeout: Duration::from_secs(10),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("DATASERVE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("DATASERVE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("DATASERVE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("DATASERVE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("DATASERVE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("DATASERVE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: defaults.timeout,
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ROW DECODING
// ============================================================================

/// Build a [`Record`] from a `(id, user_id, data)` row.
///
/// A NULL or mistyped column is a decode failure, never a default value.
pub fn decode_record(row: &Row) -> Result<Record, DataError> {
    let id: i64 = row
        .try_get("id")
        .map_err(|e| DataError::decode(format!("id: {}", e)))?;
    let owner_id: i64 = row
        .try_get("user_id")
        .map_err(|e| DataError::decode(format!("user_id: {}", e)))?;
    let payload: String = row
        .try_get("data")
        .map_err(|e| DataError::decode(format!("data: {}", e)))?;
    Ok(Record::new(id, owner_id, payload))
}

fn pool_error(err: PoolError) -> DataError {
    match err {
        PoolError::Timeout(_) => DataError::connection("timed out waiting for a pooled connection"),
        PoolError::Closed => DataError::connection("connection pool is closed"),
        other => DataError::connection(other.to_string()),
    }
}

fn query_error(err: tokio_postgres::Error) -> DataError {
    DataError::query(err.to_string())
}

fn record_db_operation(operation: &str, success: bool, started: Instant) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_db_operation(operation, success, started.elapsed().as_secs_f64());
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client wrapping a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// `SELECT 1` through a pooled connection, bounded by `ctx`.
    pub async fn ping(&self, ctx: &RequestContext) -> Result<(), DataError> {
        let started = Instant::now();

        let result = match ctx
            .run(async {
                let conn = self.pool.get().await.map_err(pool_error)?;
                conn.query_one("SELECT 1", &[]).await.map_err(query_error)?;
                Ok::<_, DataError>(())
            })
            .await
        {
            Ok(result) => result,
            Err(interrupted) => Err(interrupted.into()),
        };

        record_db_operation("ping", result.is_ok(), started);
        result
    }

    /// Create the `users` and `data` tables if they do not exist.
    pub async fn apply_schema(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        tracing::info!("Database schema applied");
        Ok(())
    }

    /// Run a record query under `ctx`, timing it as `operation`.
    async fn query_records(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Record>, DataError> {
        let started = Instant::now();

        let result = match ctx
            .run(async {
                let conn = self.pool.get().await.map_err(pool_error)?;
                let statement = conn.prepare_cached(sql).await.map_err(query_error)?;
                let rows = conn.query(&statement, params).await.map_err(query_error)?;
                rows.iter()
                    .map(decode_record)
                    .collect::<Result<Vec<Record>, DataError>>()
            })
            .await
        {
            Ok(result) => result,
            Err(interrupted) => Err(interrupted.into()),
        };

        record_db_operation(operation, result.is_ok(), started);
        result
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    /// Insert one user and return its id.
    pub async fn create_user(&self, access_level: &str) -> ApiResult<OwnerId> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO users (access_level) VALUES ($1) RETURNING id",
                &[&access_level],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Insert `payloads` as records owned by `user_id`, in statements of at
    /// most [`INSERT_CHUNK_ROWS`] rows on one connection.
    pub async fn insert_records(&self, user_id: OwnerId, payloads: &[String]) -> ApiResult<u64> {
        if payloads.is_empty() {
            return Ok(0);
        }

        let conn = self.get_conn().await?;
        let mut inserted = 0;
        for chunk in payloads.chunks(INSERT_CHUNK_ROWS) {
            let sql = insert_records_sql(chunk.len());
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * 2);
            for payload in chunk {
                params.push(&user_id);
                params.push(payload);
            }
            inserted += conn.execute(sql.as_str(), &params).await?;
        }
        Ok(inserted)
    }
}

// ============================================================================
// STORAGE PORTS
// ============================================================================

#[async_trait]
impl DataSource for DbClient {
    async fn fetch_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: OwnerId,
    ) -> Result<Vec<Record>, DataError> {
        self.query_records(ctx, "fetch_by_owner", SELECT_BY_OWNER, &[&owner_id])
            .await
    }

    async fn fetch_all(&self, ctx: &RequestContext) -> Result<Vec<Record>, DataError> {
        self.query_records(ctx, "fetch_all", SELECT_ALL, &[]).await
    }
}

#[async_trait]
impl AccessResolver for DbClient {
    async fn lookup(
        &self,
        ctx: &RequestContext,
        user_id: OwnerId,
    ) -> Result<AccessLevel, AccessResolutionError> {
        let started = Instant::now();

        let result = match ctx
            .run(async {
                let conn = self
                    .pool
                    .get()
                    .await
                    .map_err(|e| AccessResolutionError::lookup(e.to_string()))?;
                let row = conn
                    .query_opt(SELECT_ACCESS_LEVEL, &[&user_id])
                    .await
                    .map_err(|e| AccessResolutionError::lookup(e.to_string()))?
                    .ok_or(AccessResolutionError::NotFound { user_id })?;
                let level: String = row
                    .try_get("access_level")
                    .map_err(|e| AccessResolutionError::lookup(e.to_string()))?;
                Ok::<_, AccessResolutionError>(AccessLevel::parse(&level))
            })
            .await
        {
            Ok(result) => result,
            Err(interrupted) => Err(interrupted.into()),
        };

        record_db_operation("access_level", result.is_ok(), started);
        result
    }
}
