//! Bearer token identity.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use huddle_common::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

const ACCESS_TOKEN_TYPE: &str = "access";

/// The caller behind a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// Resolves bearer tokens to identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate an opaque bearer token.
    async fn authenticate(&self, token: &str) -> AppResult<Identity>;
}

/// Token claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    exp: i64,
    iat: i64,
    token_type: String,
}

/// HS256 JWT identity provider.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: Duration,
}

impl JwtIdentityProvider {
    /// Create a provider signing with `secret`.
    #[must_use]
    pub fn new(secret: &str, access_token_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_ttl,
        }
    }

    /// Issue an access token.
    pub fn issue_access_token(&self, user_id: &str, email: &str) -> AppResult<String> {
        self.issue(user_id, email, ACCESS_TOKEN_TYPE, self.access_token_ttl)
    }

    fn issue(
        &self,
        user_id: &str,
        email: &str,
        token_type: &str,
        ttl: Duration,
    ) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            token_type: token_type.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(&self, token: &str) -> AppResult<Identity> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))?;

        if data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AppError::Unauthorized);
        }

        Ok(Identity {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}
