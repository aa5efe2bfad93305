#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use subsync_backend::AppResult;
use subsync_backend::config::PayPalConfig;
use subsync_backend::external::PayPalClient;
use subsync_backend::services::{
    LedgerRow, LedgerUpsert, LedgerWrite, Plan, PlanRegistry, SubscriptionLedger,
    SubscriptionSyncService, is_stale,
};
use uuid::Uuid;

pub const BASIC_AUTH: &str = "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=";
pub const WEBHOOK_ID: &str = "WH-TEST-1";
pub const ACCESS_TOKEN: &str = "A21AAtest-token";

#[derive(Default)]
pub struct MemoryPlans {
    plans: Vec<Plan>,
}

impl MemoryPlans {
    pub fn with_defaults() -> Self {
        Self {
            plans: vec![
                plan("pro-monthly", "P-123", true),
                plan("legacy-yearly", "P-OLD", false),
            ],
        }
    }
}

pub fn plan(id: &str, paypal_plan_id: &str, is_active: bool) -> Plan {
    Plan {
        id: id.to_string(),
        name: Some(id.to_string()),
        paypal_plan_id: paypal_plan_id.to_string(),
        is_active,
        created_at: None,
    }
}

#[async_trait]
impl PlanRegistry for MemoryPlans {
    async fn find_active_plan(&self, plan_id: &str) -> AppResult<Option<Plan>> {
        Ok(self
            .plans
            .iter()
            .find(|p| p.id == plan_id && p.is_active)
            .cloned())
    }

    async fn find_plan_by_paypal_id(&self, paypal_plan_id: &str) -> AppResult<Option<Plan>> {
        Ok(self
            .plans
            .iter()
            .find(|p| p.paypal_plan_id == paypal_plan_id)
            .cloned())
    }
}

/// Ledger with the same upsert rules as `LedgerService`, kept in memory.
#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<HashMap<String, LedgerRow>>,
    upserts: AtomicUsize,
}

impl MemoryLedger {
    pub fn row(&self, paypal_subscription_id: &str) -> Option<LedgerRow> {
        self.rows
            .lock()
            .unwrap()
            .get(paypal_subscription_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn seed(&self, row: LedgerRow) {
        self.rows
            .lock()
            .unwrap()
            .insert(row.paypal_subscription_id.clone(), row);
    }
}

#[async_trait]
impl SubscriptionLedger for MemoryLedger {
    async fn upsert_by_external_id(&self, write: LedgerUpsert) -> AppResult<LedgerWrite> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let next_id = rows.len() as i64 + 1;

        if let Some(row) = rows.get_mut(&write.paypal_subscription_id) {
            if is_stale(row.remote_updated_at, write.remote_updated_at) {
                return Ok(LedgerWrite::SkippedStale);
            }
            if let Some(status) = write.status {
                row.status = status;
            }
            row.started_at = write.started_at;
            row.raw = Some(write.snapshot);
            if write.remote_updated_at.is_some() {
                row.remote_updated_at = write.remote_updated_at;
            }
            return Ok(LedgerWrite::Updated);
        }

        let Some(owner) = write.owner else {
            return Ok(LedgerWrite::NoMatchingRow);
        };
        rows.insert(
            write.paypal_subscription_id.clone(),
            LedgerRow {
                id: next_id,
                user_id: owner.user_id,
                plan_id: Some(owner.plan_id),
                paypal_subscription_id: write.paypal_subscription_id,
                status: write.status.unwrap_or_default(),
                started_at: write.started_at,
                remote_updated_at: write.remote_updated_at,
                raw: Some(write.snapshot),
                created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            },
        );
        Ok(LedgerWrite::Inserted)
    }

    async fn find_by_external_id(
        &self,
        paypal_subscription_id: &str,
    ) -> AppResult<Option<LedgerRow>> {
        Ok(self.row(paypal_subscription_id))
    }
}

pub fn paypal_config(base_url: &str, cache_tokens: bool) -> PayPalConfig {
    PayPalConfig {
        environment: "sandbox".to_string(),
        base_url: Some(base_url.to_string()),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        webhook_id: WEBHOOK_ID.to_string(),
        brand_name: "WatchVIM".to_string(),
        public_base_url: None,
        request_timeout_secs: 5,
        cache_tokens,
        token_expiry_margin_secs: 60,
    }
}

pub struct Harness {
    pub server: MockServer,
    pub ledger: Arc<MemoryLedger>,
    pub service: SubscriptionSyncService,
}

pub async fn harness() -> Harness {
    let server = MockServer::start_async().await;
    let ledger = Arc::new(MemoryLedger::default());
    let paypal = PayPalClient::new(&paypal_config(&server.base_url(), true)).unwrap();
    let service = SubscriptionSyncService::new(
        paypal,
        Arc::new(MemoryPlans::with_defaults()),
        ledger.clone(),
    );
    Harness {
        server,
        ledger,
        service,
    }
}

pub fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/oauth2/token")
            .header("authorization", BASIC_AUTH)
            .body("grant_type=client_credentials");
        then.status(200).json_body(json!({
            "scope": "https://uri.paypal.com/services/subscriptions",
            "access_token": ACCESS_TOKEN,
            "token_type": "Bearer",
            "app_id": "APP-80W284485P519543T",
            "expires_in": 32400,
            "nonce": "2024-01-01T00:00:00ZnSq"
        }));
    })
}

pub fn mock_verification<'a>(server: &'a MockServer, verification_status: &str) -> httpmock::Mock<'a> {
    let body = json!({ "verification_status": verification_status });
    server.mock(move |when, then| {
        when.method(POST)
            .path("/v1/notifications/verify-webhook-signature")
            .header("authorization", format!("Bearer {ACCESS_TOKEN}"))
            .json_body_partial(format!(r#"{{"webhook_id":"{WEBHOOK_ID}"}}"#));
        then.status(200).json_body(body);
    })
}

pub fn mock_fetch<'a>(
    server: &'a MockServer,
    subscription_id: &str,
    body: serde_json::Value,
) -> httpmock::Mock<'a> {
    let path = format!("/v1/billing/subscriptions/{subscription_id}");
    server.mock(move |when, then| {
        when.method(GET)
            .path(path)
            .header("authorization", format!("Bearer {ACCESS_TOKEN}"));
        then.status(200).json_body(body);
    })
}

pub fn mock_fetch_missing<'a>(server: &'a MockServer, subscription_id: &str) -> httpmock::Mock<'a> {
    let path = format!("/v1/billing/subscriptions/{subscription_id}");
    server.mock(move |when, then| {
        when.method(GET).path(path);
        then.status(404).json_body(json!({
            "name": "RESOURCE_NOT_FOUND",
            "message": "The specified resource does not exist.",
            "details": [{"issue": "INVALID_RESOURCE_ID"}]
        }));
    })
}

pub fn active_snapshot(subscription_id: &str) -> serde_json::Value {
    json!({
        "id": subscription_id,
        "plan_id": "P-123",
        "status": "ACTIVE",
        "start_time": "2024-01-01T00:00:00Z",
        "update_time": "2024-01-01T00:05:00Z",
        "custom_id": "ignored",
        "links": [{"href": format!("https://api-m.sandbox.paypal.com/v1/billing/subscriptions/{subscription_id}"), "rel": "self", "method": "GET"}]
    })
}

pub fn signature_headers() -> subsync_backend::external::WebhookSignatureHeaders {
    subsync_backend::external::WebhookSignatureHeaders {
        auth_algo: Some("SHA256withRSA".to_string()),
        cert_url: Some("https://api-m.sandbox.paypal.com/v1/notifications/certs/CERT-1".to_string()),
        transmission_id: Some("69cd13f0-d67a-11e5-baa3-778b53f4ae55".to_string()),
        transmission_sig: Some("lmI95Jx3Y9nhR5SJWlHVIWpg4AgFk7n9bCHSRxbrd8A9zrhdu2rMyFrmz+Zjh3s3boXB07VXCXUZy/UFzUlnGJn0wDugt7FlSvdKeIJenLRemUxYCPVoEZzg9VFNqOa48gMkvF+XTpxBeUx/kWy6B5cp7GkT2+pOowfRK7OaynuxUoKW3JcMWw272VKjLTtTAShncla7tGF+55rxyt2KNZIIqxNMJ48RDZheGU5w1npu9dZHnPgTXB9iomeVRoD8O/jhRpnKsGrDschyNdkeh81BJJMH4Ctc6lnCCquoP/GzCzz33MMsNdid7vL/NIWaCsekQpW26FpWPi/tfj8nLA==".to_string()),
        transmission_time: Some("2024-01-01T00:10:00Z".to_string()),
    }
}

pub fn existing_row(paypal_subscription_id: &str, status: &str) -> LedgerRow {
    LedgerRow {
        id: 1,
        user_id: Uuid::new_v4(),
        plan_id: Some("pro-monthly".to_string()),
        paypal_subscription_id: paypal_subscription_id.to_string(),
        status: status.to_string(),
        started_at: None,
        remote_updated_at: None,
        raw: None,
        created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
    }
}
