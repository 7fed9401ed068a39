//! Authentication Module
//!
//! Bearer-token authentication for the data endpoint. A request carries
//! `Authorization: Bearer <jwt>`; the token is an HS256 JWT signed with the
//! configured code phrase and carrying the caller's `user_id`.
//!
//! Signature checking is delegated to `jsonwebtoken`; time claims are checked
//! here against an injectable [`JwtClock`].

use crate::config::ConfigError;
use crate::error::{ApiError, ApiResult};
use dataserve_core::OwnerId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for JWT time validation.
///
/// Owning time validation (instead of letting `jsonwebtoken` read the system
/// clock) keeps tests deterministic.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. Negative for pre-1970 clocks.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// JWT SECRET
// ============================================================================

/// JWT signing secret (the configured code phrase). Never printed.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "auth.jwt_code_phrase".to_string(),
            });
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: JwtSecret,

    /// Signing algorithm (HS256).
    pub jwt_algorithm: Algorithm,

    /// Leeway applied to `exp`.
    pub jwt_clock_skew_secs: i64,

    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl AuthConfig {
    pub fn new(jwt_secret: JwtSecret) -> Self {
        Self {
            jwt_secret,
            jwt_algorithm: Algorithm::HS256,
            jwt_clock_skew_secs: 0,
            clock: Arc::new(SystemClock),
        }
    }

    /// Build from the `auth` section of the service configuration.
    pub fn from_section(section: &crate::config::AuthSection) -> Result<Self, ConfigError> {
        let secret = JwtSecret::new(section.jwt_code_phrase.clone())?;
        Ok(Self::new(secret).with_clock_skew(section.clock_skew_secs))
    }

    pub fn with_clock_skew(mut self, secs: i64) -> Self {
        self.jwt_clock_skew_secs = secs.max(0);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn JwtClock>) -> Self {
        self.clock = clock;
        self
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// Token claims: the caller's user id plus registered time and id claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: OwnerId,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Token id
    pub jti: String,
}

impl Claims {
    pub fn new(user_id: OwnerId, ttl: Duration, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        Self {
            user_id,
            iat: now,
            exp: now.saturating_add(ttl_secs),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Identity extracted from a validated token, injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: OwnerId,
    pub token_id: String,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            token_id: claims.jti,
        }
    }
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly `Bearer <token>`: one space, nothing else.
pub fn parse_bearer(header_value: &str) -> ApiResult<&str> {
    let parts: Vec<&str> = header_value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] => Ok(*token),
        _ => Err(ApiError::invalid_token("invalid token format")),
    }
}

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }

    Ok(())
}

/// Validate a JWT and extract its claims.
///
/// `jsonwebtoken` checks the signature and that `exp` is present; expiry is
/// checked against `config.clock`.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => ApiError::invalid_token("invalid token"),
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();

    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error("Server time configuration error"));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;

    Ok(claims)
}

/// Sign a token for `user_id` valid for `ttl`.
pub fn generate_jwt_token(config: &AuthConfig, user_id: OwnerId, ttl: Duration) -> ApiResult<String> {
    let claims = Claims::new(user_id, ttl, &*config.clock);
    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign token");
        ApiError::internal_error("could not sign the token")
    })
}

/// Authenticate a request from its `Authorization` header.
pub fn authenticate(config: &AuthConfig, auth_header: Option<&str>) -> ApiResult<AuthContext> {
    let header_value =
        auth_header.ok_or_else(|| ApiError::unauthorized("Authorization header is required"))?;
    let token = parse_bearer(header_value)?;
    let claims = validate_jwt_token(config, token)?;
    Ok(AuthContext::from(claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn test_config() -> AuthConfig {
        let secret = JwtSecret::new("test_secret".to_string()).expect("test secret should be valid");
        AuthConfig::new(secret).with_clock(Arc::new(test_clocks::valid()))
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(JwtSecret::new(String::new()).is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() -> Result<(), ConfigError> {
        let secret = JwtSecret::new("example-phrase".to_string())?;
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("example-phrase"));
        assert!(rendered.contains("14 chars"));
        Ok(())
    }

    #[test]
    fn test_parse_bearer() -> ApiResult<()> {
        assert_eq!(parse_bearer("Bearer abc.def.ghi")?, "abc.def.ghi");

        for malformed in ["abc.def.ghi", "bearer abc", "Bearer", "Bearer a b", "Token abc", ""] {
            let err = parse_bearer(malformed).err();
            assert_eq!(
                err.map(|e| e.message),
                Some("invalid token format".to_string()),
                "{malformed:?} should be rejected"
            );
        }
        Ok(())
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config();

        let token = generate_jwt_token(&config, 100, Duration::from_secs(24 * 3600))?;
        let claims = validate_jwt_token(&config, &token)?;

        assert_eq!(claims.user_id, 100);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(!claims.jti.is_empty());
        assert!(!claims.is_expired(&test_clocks::valid()));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        let token = generate_jwt_token(&config, 1, Duration::from_secs(600))?;

        config.clock = Arc::new(test_clocks::future());
        let result = validate_jwt_token(&config, &token);

        assert_eq!(result.err().map(|e| e.code), Some(ErrorCode::TokenExpired));
        Ok(())
    }

    #[test]
    fn test_clock_skew_tolerates_recent_expiry() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, 1, Duration::from_secs(60))?;

        let later = FixedClock(test_clocks::valid().0 + 90);
        let strict = test_config().with_clock(Arc::new(later));
        assert!(validate_jwt_token(&strict, &token).is_err());

        let lenient = test_config().with_clock(Arc::new(later)).with_clock_skew(60);
        assert_eq!(validate_jwt_token(&lenient, &token)?.user_id, 1);
        Ok(())
    }

    #[test]
    fn test_wrong_secret_rejected() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, 1, Duration::from_secs(600))?;

        let other = AuthConfig::new(
            JwtSecret::new("another_secret".to_string()).expect("test secret should be valid"),
        )
        .with_clock(Arc::new(test_clocks::valid()));

        let err = validate_jwt_token(&other, &token).err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidToken));
        Ok(())
    }

    #[test]
    fn test_garbage_token_rejected() {
        let config = test_config();
        let err = validate_jwt_token(&config, "not-a-jwt").err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidToken));
    }

    #[test]
    fn test_pre_epoch_clock_is_server_error() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, 1, Duration::from_secs(600))?;

        let broken = test_config().with_clock(Arc::new(FixedClock(-5)));
        let err = validate_jwt_token(&broken, &token).err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InternalError));
        Ok(())
    }

    #[test]
    fn test_authenticate() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, 42, Duration::from_secs(600))?;
        let header = format!("Bearer {}", token);

        let context = authenticate(&config, Some(&header))?;
        assert_eq!(context.user_id, 42);

        let missing = authenticate(&config, None).err();
        assert_eq!(missing.map(|e| e.code), Some(ErrorCode::Unauthorized));

        let raw = authenticate(&config, Some(&token)).err();
        assert_eq!(raw.map(|e| e.code), Some(ErrorCode::InvalidToken));
        Ok(())
    }
}
