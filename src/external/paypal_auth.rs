use crate::config::PayPalConfig;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// PayPal bearer token with its computed expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, margin: Duration) -> bool {
        Utc::now() + margin < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges the client credentials for an OAuth2 token.
///
/// With caching enabled, the token is reused until `expires_in` minus the
/// configured margin. The mutex is held across the exchange so concurrent
/// callers wait for a single refresh instead of each hitting the endpoint.
#[derive(Clone)]
pub struct TokenBroker {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cache_enabled: bool,
    margin: Duration,
    cached: Arc<Mutex<Option<AccessToken>>>,
}

impl TokenBroker {
    pub fn new(http: Client, config: &PayPalConfig) -> Self {
        Self {
            http,
            token_url: format!("{}/v1/oauth2/token", config.api_base()),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cache_enabled: config.cache_tokens,
            margin: Duration::seconds(config.token_expiry_margin_secs.max(0)),
            cached: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn acquire_token(&self) -> AppResult<AccessToken> {
        if !self.cache_enabled {
            return self.exchange().await;
        }

        let mut slot = self.cached.lock().await;
        if let Some(token) = slot.as_ref()
            && token.is_fresh(self.margin)
        {
            log::debug!("Reusing cached PayPal access token");
            return Ok(token.clone());
        }

        let token = self.exchange().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token, e.g. after PayPal answered 401 to it.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn exchange(&self) -> AppResult<AccessToken> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::ProviderAuthError(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::ProviderAuthError(format!("token response unreadable: {e}")))?;

        if !status.is_success() {
            let description = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| "PayPal token error".to_string());
            return Err(AppError::ProviderAuthError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                description
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::ProviderAuthError(format!("malformed token response: {e}")))?;

        log::info!("Obtained PayPal access token");

        Ok(AccessToken {
            value: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in.unwrap_or(0)),
        })
    }
}
