use crate::config::PayPalConfig;
use crate::error::{AppError, AppResult};
use crate::external::paypal_auth::TokenBroker;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const STATUS_APPROVAL_PENDING: &str = "APPROVAL_PENDING";

pub const HEADER_AUTH_ALGO: &str = "paypal-auth-algo";
pub const HEADER_CERT_URL: &str = "paypal-cert-url";
pub const HEADER_TRANSMISSION_ID: &str = "paypal-transmission-id";
pub const HEADER_TRANSMISSION_SIG: &str = "paypal-transmission-sig";
pub const HEADER_TRANSMISSION_TIME: &str = "paypal-transmission-time";

/// PayPal resource ids (`I-BW452GLLEP1G`, `80021663DE681814L`) are short
/// runs of ASCII letters, digits and dashes. Anything else must not reach a
/// request path.
pub fn is_resource_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescription {
    pub href: String,
    pub rel: String,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionFields {
    id: String,
    #[serde(default)]
    plan_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    links: Vec<LinkDescription>,
}

/// A subscription as returned by PayPal, with the untouched JSON kept in `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSubscription {
    pub id: String,
    pub plan_id: Option<String>,
    pub status: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub links: Vec<LinkDescription>,
    pub raw: Value,
}

impl RemoteSubscription {
    pub fn from_json(raw: Value) -> AppResult<Self> {
        let fields: SubscriptionFields = serde_json::from_value(raw.clone())?;
        Ok(Self {
            id: fields.id,
            plan_id: fields.plan_id,
            status: fields.status,
            start_time: fields.start_time,
            update_time: fields.update_time,
            links: fields.links,
            raw,
        })
    }

    pub fn approve_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href.as_str())
    }
}

/// The five transmission headers PayPal attaches to every webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookSignatureHeaders {
    pub auth_algo: Option<String>,
    pub cert_url: Option<String>,
    pub transmission_id: Option<String>,
    pub transmission_sig: Option<String>,
    pub transmission_time: Option<String>,
}

impl WebhookSignatureHeaders {
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            auth_algo: get(HEADER_AUTH_ALGO),
            cert_url: get(HEADER_CERT_URL),
            transmission_id: get(HEADER_TRANSMISSION_ID),
            transmission_sig: get(HEADER_TRANSMISSION_SIG),
            transmission_time: get(HEADER_TRANSMISSION_TIME),
        }
    }

    fn complete(&self) -> Option<[&str; 5]> {
        fn nonempty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        Some([
            nonempty(&self.auth_algo)?,
            nonempty(&self.cert_url)?,
            nonempty(&self.transmission_id)?,
            nonempty(&self.transmission_sig)?,
            nonempty(&self.transmission_time)?,
        ])
    }
}

#[derive(Debug, Serialize)]
struct VerifySignatureRequest<'a> {
    auth_algo: &'a str,
    cert_url: &'a str,
    transmission_id: &'a str,
    transmission_sig: &'a str,
    transmission_time: &'a str,
    webhook_id: &'a str,
    webhook_event: &'a Value,
}

#[derive(Debug, Deserialize)]
struct VerifySignatureResponse {
    #[serde(default)]
    verification_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PayPalErrorBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<PayPalErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct PayPalErrorDetail {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    issue: Option<String>,
}

impl PayPalErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn summary(&self, fallback: &str) -> String {
        match (&self.name, &self.message) {
            (Some(name), Some(message)) => format!("{name}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(name), None) => name.clone(),
            (None, None) => fallback.to_string(),
        }
    }

    fn rejects_plan(&self) -> bool {
        self.details.iter().any(|d| {
            d.issue.as_deref() == Some("PLAN_STATUS_INVALID")
                || d.field
                    .as_deref()
                    .is_some_and(|f| f.trim_start_matches('/') == "plan_id")
        })
    }
}

/// Client for the PayPal subscriptions and webhook-verification APIs.
#[derive(Clone)]
pub struct PayPalClient {
    http: Client,
    base_url: String,
    webhook_id: String,
    brand_name: String,
    tokens: TokenBroker,
}

impl PayPalClient {
    pub fn new(config: &PayPalConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("subsync-backend/paypal")
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::ConfigError(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            tokens: TokenBroker::new(http.clone(), config),
            http,
            base_url: config.api_base(),
            webhook_id: config.webhook_id.clone(),
            brand_name: config.brand_name.clone(),
        })
    }

    pub async fn create_subscription(
        &self,
        paypal_plan_id: &str,
        return_url: &str,
        cancel_url: &str,
        custom_id: &str,
    ) -> AppResult<RemoteSubscription> {
        let token = self.tokens.acquire_token().await?;
        let body = serde_json::json!({
            "plan_id": paypal_plan_id,
            "application_context": {
                "brand_name": self.brand_name,
                "user_action": "SUBSCRIBE_NOW",
                "return_url": return_url,
                "cancel_url": cancel_url,
            },
            "custom_id": custom_id,
        });

        let response = self
            .http
            .post(format!("{}/v1/billing/subscriptions", self.base_url))
            .bearer_auth(&token.value)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = self.read_error_body(status, response).await;
            let err = PayPalErrorBody::parse(&text);
            if err.rejects_plan() {
                return Err(AppError::PlanRejected(
                    err.summary("PayPal rejected the plan"),
                ));
            }
            return Err(AppError::ProviderError(format!(
                "create subscription failed with HTTP {}: {}",
                status.as_u16(),
                err.summary("PayPal create subscription failed")
            )));
        }

        let raw: Value = response.json().await?;
        let created = RemoteSubscription::from_json(raw)?;
        log::info!(
            "Created PayPal subscription {} for plan {}",
            created.id,
            paypal_plan_id
        );
        Ok(created)
    }

    pub async fn fetch_subscription(&self, subscription_id: &str) -> AppResult<RemoteSubscription> {
        if !is_resource_id(subscription_id) {
            return Err(AppError::ValidationError("Invalid subscriptionId".to_string()));
        }

        let token = self.tokens.acquire_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/v1/billing/subscriptions/{}",
                self.base_url, subscription_id
            ))
            .bearer_auth(&token.value)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "PayPal subscription {subscription_id} not found"
            )));
        }
        if !status.is_success() {
            let text = self.read_error_body(status, response).await;
            return Err(AppError::ProviderError(format!(
                "fetch subscription failed with HTTP {}: {}",
                status.as_u16(),
                PayPalErrorBody::parse(&text).summary("Failed to fetch subscription")
            )));
        }

        let raw: Value = response.json().await?;
        RemoteSubscription::from_json(raw)
    }

    /// Asks PayPal whether a webhook delivery is authentic.
    ///
    /// Every failure on the verification call itself yields `Ok(false)`.
    /// Only a failed token exchange is returned as an error.
    pub async fn verify_signature(
        &self,
        headers: &WebhookSignatureHeaders,
        event: &Value,
    ) -> AppResult<bool> {
        let Some([auth_algo, cert_url, transmission_id, transmission_sig, transmission_time]) =
            headers.complete()
        else {
            log::warn!("Webhook delivery is missing PayPal transmission headers");
            return Ok(false);
        };

        let token = self.tokens.acquire_token().await?;
        let request = VerifySignatureRequest {
            auth_algo,
            cert_url,
            transmission_id,
            transmission_sig,
            transmission_time,
            webhook_id: &self.webhook_id,
            webhook_event: event,
        };

        let response = match self
            .http
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                self.base_url
            ))
            .bearer_auth(&token.value)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Webhook signature verification call failed: {e}");
                return Ok(false);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = self.read_error_body(status, response).await;
            log::error!(
                "Webhook signature verification returned HTTP {}: {}",
                status.as_u16(),
                text
            );
            return Ok(false);
        }

        match response.json::<VerifySignatureResponse>().await {
            Ok(out) => Ok(out.verification_status.as_deref() == Some("SUCCESS")),
            Err(e) => {
                log::error!("Unreadable signature verification response: {e}");
                Ok(false)
            }
        }
    }

    async fn read_error_body(&self, status: StatusCode, response: Response) -> String {
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string())
    }
}
