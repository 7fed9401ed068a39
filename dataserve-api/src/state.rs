//! Application state shared by every route.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dataserve_core::RequestContext;
use dataserve_storage::{
    AccessLevelRouter, AccessResolver, CacheBackend, CachedRepository, DataSource, KeyPrefix,
    MemoryCacheBackend, RedisCacheBackend,
};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthConfig;
use crate::config::{CacheBackendKind, ServiceConfig};
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::MetricsObserver;

/// Router over type-erased collaborators, so the binary can pick the cache
/// backend at runtime and tests can plug in mocks.
pub type DataRouter = AccessLevelRouter<dyn AccessResolver, dyn DataSource>;

// ============================================================================
// READINESS PROBES
// ============================================================================

/// A dependency checked by `/health/ready`.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Component name in the readiness report.
    fn name(&self) -> &'static str;

    async fn check(&self, ctx: &RequestContext) -> Result<(), String>;
}

#[async_trait]
impl ReadinessProbe for DbClient {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self, ctx: &RequestContext) -> Result<(), String> {
        self.ping(ctx).await.map_err(|e| e.to_string())
    }
}

/// Readiness probe over any cache backend.
pub struct CacheProbe(pub Arc<dyn CacheBackend>);

#[async_trait]
impl ReadinessProbe for CacheProbe {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn check(&self, ctx: &RequestContext) -> Result<(), String> {
        self.0.ping(ctx).await.map_err(|e| e.to_string())
    }
}

// ============================================================================
// APP STATE
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub router: DataRouter,
    pub auth: Arc<AuthConfig>,
    pub probes: Vec<Arc<dyn ReadinessProbe>>,
    /// Cancelled on shutdown; every request context is a child of it.
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(router: DataRouter, auth: Arc<AuthConfig>, request_timeout: Duration) -> Self {
        Self {
            router,
            auth,
            probes: Vec::new(),
            shutdown: CancellationToken::new(),
            request_timeout,
            start_time: Instant::now(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Fresh context for one request: cancelled on shutdown, bounded by the
    /// configured request timeout.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_token(self.shutdown.child_token()).with_timeout(self.request_timeout)
    }
}

// ============================================================================
// WIRING
// ============================================================================

/// Bounds on how often the memory cache sweeps expired entries.
const MIN_PURGE_INTERVAL: Duration = Duration::from_secs(1);
const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep once per TTL, within [`MIN_PURGE_INTERVAL`, `MAX_PURGE_INTERVAL`].
pub fn memory_purge_interval(ttl: Duration) -> Duration {
    ttl.clamp(MIN_PURGE_INTERVAL, MAX_PURGE_INTERVAL)
}

/// Build the configured cache backend.
///
/// The memory backend gets a purge task that stops when `shutdown` fires.
pub fn build_cache(
    config: &ServiceConfig,
    shutdown: &CancellationToken,
) -> ApiResult<Arc<dyn CacheBackend>> {
    let ttl = config.cache.ttl();
    let cache: Arc<dyn CacheBackend> = match config.cache.backend {
        CacheBackendKind::Redis => Arc::new(
            RedisCacheBackend::from_url(&config.redis.url(), ttl).map_err(|e| {
                ApiError::internal_error(format!("Failed to create cache pool: {}", e))
            })?,
        ),
        CacheBackendKind::Memory => {
            let memory = Arc::new(MemoryCacheBackend::new(ttl));
            MemoryCacheBackend::spawn_purger(
                Arc::clone(&memory),
                memory_purge_interval(ttl),
                shutdown.clone(),
            );
            memory
        }
    };
    Ok(cache)
}

/// Wire Postgres, the cache and the repository into an [`AppState`].
///
/// Nothing connects yet: both pools are lazy, so a dependency that is down
/// shows up in `/health/ready` rather than failing startup.
pub fn build_state(config: &ServiceConfig) -> ApiResult<AppState> {
    let shutdown = CancellationToken::new();
    let db = Arc::new(DbClient::from_config(&config.db.to_db_config())?);
    let cache = build_cache(config, &shutdown)?;

    let repository = CachedRepository::new(
        Arc::clone(&db),
        Arc::clone(&cache),
        KeyPrefix::new(config.cache.key_prefix.clone()),
    )
    .with_fanout_concurrency(config.cache.fanout_concurrency)
    .with_observer(Arc::new(MetricsObserver));

    let resolver: Arc<dyn AccessResolver> = db.clone();
    let repository: Arc<dyn DataSource> = Arc::new(repository);
    let auth = AuthConfig::from_section(&config.auth)?;

    tracing::info!(
        backend = ?config.cache.backend,
        key_prefix = %config.cache.key_prefix,
        ttl_ms = config.cache.ttl,
        fanout_concurrency = config.cache.fanout_concurrency,
        "Cache configured"
    );

    Ok(AppState::new(
        AccessLevelRouter::new(resolver, repository),
        Arc::new(auth),
        config.server.request_timeout(),
    )
    .with_probe(db)
    .with_probe(Arc::new(CacheProbe(cache)))
    .with_shutdown(shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtSecret;
    use dataserve_storage::{MockAccessResolver, MockDataSource};

    fn state() -> Result<AppState, String> {
        let resolver: Arc<dyn AccessResolver> = Arc::new(MockAccessResolver::new());
        let source: Arc<dyn DataSource> = Arc::new(MockDataSource::new(Vec::new()));
        let secret = JwtSecret::new("phrase".to_string()).map_err(|e| e.to_string())?;
        Ok(AppState::new(
            AccessLevelRouter::new(resolver, source),
            Arc::new(AuthConfig::new(secret)),
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn test_request_context_has_deadline() -> Result<(), String> {
        let ctx = state()?.request_context();
        let remaining = ctx.remaining().ok_or("missing deadline")?;
        assert!(remaining <= Duration::from_secs(5));
        assert!(!ctx.is_cancelled());
        Ok(())
    }

    #[tokio::test]
    async fn test_build_state_with_memory_cache() -> Result<(), String> {
        let mut config = ServiceConfig::default();
        config.auth.jwt_code_phrase = "example-phrase".to_string();
        config.cache.backend = CacheBackendKind::Memory;

        let state = build_state(&config).map_err(|e| e.message)?;
        let names: Vec<&str> = state.probes.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["database", "cache"]);
        Ok(())
    }

    #[test]
    fn test_memory_purge_interval_is_bounded() {
        assert_eq!(memory_purge_interval(Duration::from_millis(10)), Duration::from_secs(1));
        assert_eq!(memory_purge_interval(Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(memory_purge_interval(Duration::from_secs(3600)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_build_state_requires_code_phrase() {
        let mut config = ServiceConfig::default();
        config.cache.backend = CacheBackendKind::Memory;
        assert!(build_state(&config).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_request_contexts() -> Result<(), String> {
        let state = state()?;
        let ctx = state.request_context();
        state.shutdown.cancel();
        assert!(ctx.is_cancelled());
        Ok(())
    }
}
