//! JWT access token validation
//! 令牌由外部身份服务签发；本服务只识别 `sub` 中的用户 ID

use crate::{config::AppConfig, error::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Token type (only "access" is accepted)
    pub token_type: String,

    pub iat: i64,
    pub exp: i64,

    /// JWT ID
    pub jti: String,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_exp_secs: u64,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.security.jwt_secret.expose_secret(),
            config.security.access_token_exp_secs,
        )
    }

    pub fn new(secret: &str, access_token_exp_secs: u64) -> Result<Self, AppError> {
        // HS256 密钥至少 32 字节
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_exp_secs,
        })
    }

    /// Issue an access token (tests and tooling)
    pub fn generate_access_token(&self, user_id: &Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.access_token_exp_secs as i64);

        let claims = Claims {
            sub: user_id.to_string(),
            token_type: "access".to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {}", e))
        })
    }

    /// Validate and decode token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        Ok(decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::Unauthorized
            })?
            .claims)
    }

    /// Validate an access token and return the user id it carries
    pub fn validate_access_token(&self, token: &str) -> Result<Uuid, AppError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != "access" {
            tracing::debug!("Token type mismatch: expected 'access', got '{}'", claims.token_type);
            return Err(AppError::Unauthorized);
        }

        Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)
    }
}
