/*!
 * # Caller identity
 *
 * Requests carry an HS256 bearer token whose claims name the caller's id,
 * role and account status. The API trusts the decoded triple; issuing tokens
 * is only exposed for tests and operator tooling.
 */

use crate::entities::{user, AccountStatus, UserRole};
use crate::errors::ServiceError;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Subject (user ID)
    pub role: UserRole,        // Caller role
    pub status: AccountStatus, // Account status at issue time
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl: std::time::Duration,
}

impl From<&crate::config::AppConfig> for AuthConfig {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            issuer: cfg.auth_issuer.clone(),
            audience: cfg.auth_audience.clone(),
            token_ttl: std::time::Duration::from_secs(cfg.jwt_expiration as u64),
        }
    }
}

/// Encodes and validates bearer tokens.
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issues a token for `user` carrying their current role and status.
    pub fn issue_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.config.token_ttl)
            .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            status: user.status,
            email: Some(user.email.clone()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    debug!(error = %e, "rejected bearer token");
                    AuthError::InvalidToken
                }
            })
    }
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: UserRole,
    pub status: AccountStatus,
    pub email: Option<String>,
}

impl Caller {
    pub fn new(id: Uuid, role: UserRole, status: AccountStatus) -> Self {
        Self {
            id,
            role,
            status,
            email: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Managers and admins.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Manager)
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Approved
    }

    /// Mutations require an approved account.
    pub fn ensure_active(&self) -> Result<(), ServiceError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Account is {}; only approved accounts can perform this action",
                self.status
            )))
        }
    }

    pub fn require_staff(&self) -> Result<(), ServiceError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Manager or admin role required".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Admin role required".to_string()))
        }
    }

    /// Owners see their own records; staff see everything.
    pub fn can_view(&self, owner_id: Uuid) -> bool {
        self.is_staff() || self.id == owner_id
    }
}

impl From<&user::Model> for Caller {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            role: user.role,
            status: user.status,
            email: Some(user.email.clone()),
        }
    }
}

impl TryFrom<Claims> for Caller {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            id,
            role: claims.role,
            status: claims.status,
            email: claims.email,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = auth.validate_token(token)?;
        Ok(Caller::try_from(claims)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "unit-test-secret-that-is-long-enough-for-hs256".into(),
            issuer: "garmentflow-api".into(),
            audience: "garmentflow-clients".into(),
            token_ttl: std::time::Duration::from_secs(600),
        })
    }

    fn user(role: UserRole, status: AccountStatus) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            name: "Test User".into(),
            email: "test@example.com".into(),
            role,
            status,
            suspend_reason: None,
            suspend_feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_round_trips_caller_identity() {
        let auth = service();
        let manager = user(UserRole::Manager, AccountStatus::Approved);
        let token = auth.issue_token(&manager).unwrap();

        let caller = Caller::try_from(auth.validate_token(&token).unwrap()).unwrap();
        assert_eq!(caller.id, manager.id);
        assert_eq!(caller.role, UserRole::Manager);
        assert!(caller.is_staff());
        assert!(caller.is_active());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(AuthConfig {
            jwt_secret: "a-completely-different-secret-value-for-tests".into(),
            issuer: "garmentflow-api".into(),
            audience: "garmentflow-clients".into(),
            token_ttl: std::time::Duration::from_secs(600),
        });
        let token = other
            .issue_token(&user(UserRole::Admin, AccountStatus::Approved))
            .unwrap();

        assert!(matches!(
            service().validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn pending_account_cannot_mutate() {
        let caller = Caller::new(Uuid::new_v4(), UserRole::Manager, AccountStatus::Pending);
        assert!(matches!(
            caller.ensure_active(),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
