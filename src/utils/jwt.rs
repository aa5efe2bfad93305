use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by access tokens of the identity backend.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated caller attached to the request by `AuthMiddleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match config.audience.as_deref().filter(|a| !a.is_empty()) {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AppError::from)
    }

    /// Verifies the bearer token and resolves it to a known user.
    pub fn verify_caller_token(&self, token: &str) -> AppResult<CallerIdentity> {
        let claims = self.verify_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user token".to_string()))?;
        Ok(CallerIdentity {
            user_id,
            email: claims.email,
        })
    }
}
