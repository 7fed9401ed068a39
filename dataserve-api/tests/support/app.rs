use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use dataserve_api::config::ServerConfig;
use dataserve_api::{
    create_router, generate_jwt_token, AppState, AuthConfig, FixedClock, JwtSecret,
};
use dataserve_storage::{AccessLevelRouter, AccessResolver, CachedRepository, DataSource};
use dataserve_test_utils::{
    test_prefix, MockAccessResolver, MockCacheBackend, MockDataSource, OwnerId, Record,
};
use tower::ServiceExt;

/// Fixed "now" for every token issued and checked in these tests.
pub const NOW: i64 = 1_700_000_000;

/// The full HTTP stack over mock collaborators.
pub struct TestApp {
    pub router: Router,
    pub auth: Arc<AuthConfig>,
    pub source: Arc<MockDataSource>,
    pub cache: Arc<MockCacheBackend>,
    pub resolver: Arc<MockAccessResolver>,
}

impl TestApp {
    pub fn new(resolver: MockAccessResolver, rows: Vec<Record>) -> Result<Self, String> {
        Self::with_timeout(resolver, rows, Duration::from_secs(5))
    }

    pub fn with_timeout(
        resolver: MockAccessResolver,
        rows: Vec<Record>,
        request_timeout: Duration,
    ) -> Result<Self, String> {
        let source = Arc::new(MockDataSource::new(rows));
        let cache = Arc::new(MockCacheBackend::new());
        let resolver = Arc::new(resolver);

        let secret = JwtSecret::new("example-phrase".to_string()).map_err(|e| e.to_string())?;
        let auth = Arc::new(AuthConfig::new(secret).with_clock(Arc::new(FixedClock(NOW))));

        let repository: Arc<dyn DataSource> = Arc::new(CachedRepository::new(
            Arc::clone(&source),
            Arc::clone(&cache),
            test_prefix(),
        ));
        let access: Arc<dyn AccessResolver> = resolver.clone();

        let state = AppState::new(
            AccessLevelRouter::new(access, repository),
            Arc::clone(&auth),
            request_timeout,
        );
        let router = create_router(state, &ServerConfig::default());

        Ok(Self {
            router,
            auth,
            source,
            cache,
            resolver,
        })
    }

    pub fn token_for(&self, user_id: OwnerId) -> Result<String, String> {
        generate_jwt_token(&self.auth, user_id, Duration::from_secs(600)).map_err(|e| e.message)
    }

    /// `GET path` with an optional raw `Authorization` header value.
    pub async fn get(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<(StatusCode, serde_json::Value), String> {
        let mut builder = Request::builder().uri(path);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let request = builder.body(Body::empty()).map_err(|e| e.to_string())?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        // Non-JSON bodies (`/health/ping`, `/metrics`) come back as a string.
        let json = serde_json::from_slice(&body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&body).into_owned())
        });
        Ok((status, json))
    }

    /// `GET /data` as `user_id`.
    pub async fn get_data_as(&self, user_id: OwnerId) -> Result<(StatusCode, serde_json::Value), String> {
        let token = self.token_for(user_id)?;
        self.get("/data", Some(&format!("Bearer {}", token))).await
    }
}
