use crate::error::{AppError, AppResult};
use crate::external::{
    PayPalClient, RemoteSubscription, STATUS_APPROVAL_PENDING, WebhookSignatureHeaders,
};
use crate::models::{CreateSubscriptionResponse, SyncSubscriptionResponse, WebhookEventView};
use crate::services::ledger_service::{
    LedgerUpsert, LedgerWrite, SubscriptionLedger, SubscriptionOwner,
};
use crate::services::plan_service::PlanRegistry;
use crate::utils::CallerIdentity;
use serde_json::Value;
use std::sync::Arc;

/// Result of a verified webhook delivery. Both variants are acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        subscription_id: String,
        write: LedgerWrite,
    },
    /// The event does not reference a subscription PayPal knows about.
    NoReference,
}

/// Keeps `user_subscriptions` converged with PayPal.
///
/// Create, Sync and webhook ingestion all end the same way: take a snapshot
/// PayPal just returned and upsert it by subscription id. Nothing here
/// computes a status transition locally.
#[derive(Clone)]
pub struct SubscriptionSyncService {
    paypal: PayPalClient,
    plans: Arc<dyn PlanRegistry>,
    ledger: Arc<dyn SubscriptionLedger>,
}

impl SubscriptionSyncService {
    pub fn new(
        paypal: PayPalClient,
        plans: Arc<dyn PlanRegistry>,
        ledger: Arc<dyn SubscriptionLedger>,
    ) -> Self {
        Self {
            paypal,
            plans,
            ledger,
        }
    }

    pub async fn create_subscription(
        &self,
        caller: &CallerIdentity,
        plan_id: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> AppResult<CreateSubscriptionResponse> {
        let plan = self
            .plans
            .find_active_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::PlanNotFound("Plan not found / inactive".to_string()))?;

        let user_id = caller.user_id.to_string();
        let created = self
            .paypal
            .create_subscription(&plan.paypal_plan_id, return_url, cancel_url, &user_id)
            .await?;

        let approve_url = created.approve_url().map(str::to_string);
        if approve_url.is_none() {
            log::warn!(
                "PayPal returned no approve link for subscription {}",
                created.id
            );
        }

        let write = self
            .ledger
            .upsert_by_external_id(LedgerUpsert {
                paypal_subscription_id: created.id.clone(),
                status: Some(STATUS_APPROVAL_PENDING.to_string()),
                started_at: None,
                remote_updated_at: None,
                snapshot: created.raw.clone(),
                owner: Some(SubscriptionOwner {
                    user_id: caller.user_id,
                    plan_id: plan.id.clone(),
                }),
            })
            .await?;

        log::info!(
            "Subscription {} created for user {} on plan {} ({:?})",
            created.id,
            caller.user_id,
            plan.id,
            write
        );

        Ok(CreateSubscriptionResponse {
            subscription_id: created.id,
            approve_url,
        })
    }

    pub async fn sync_subscription(
        &self,
        subscription_id: &str,
    ) -> AppResult<SyncSubscriptionResponse> {
        let snapshot = self.paypal.fetch_subscription(subscription_id).await?;

        let plan_id = match snapshot.plan_id.as_deref() {
            Some(paypal_plan_id) => self
                .plans
                .find_plan_by_paypal_id(paypal_plan_id)
                .await?
                .map(|p| p.id),
            None => None,
        };

        let write = self
            .converge(subscription_id, &snapshot, snapshot.status.clone())
            .await?;
        log::info!("Synced subscription {subscription_id}: {write:?}");

        Ok(SyncSubscriptionResponse {
            status: snapshot.status,
            plan_id,
            details: snapshot.raw,
        })
    }

    /// Verifies and applies one webhook delivery.
    pub async fn ingest_webhook(
        &self,
        event: &Value,
        headers: &WebhookSignatureHeaders,
    ) -> AppResult<WebhookOutcome> {
        if !self.paypal.verify_signature(headers, event).await? {
            return Err(AppError::InvalidSignature);
        }

        let view = WebhookEventView::new(event);
        log::info!(
            "Received PayPal webhook {} ({})",
            view.event_type().unwrap_or("<untyped>"),
            view.event_id().unwrap_or("<no id>")
        );

        let candidates = view.subscription_candidates();
        if candidates.is_empty() {
            log::info!("Webhook carries no subscription reference, nothing to sync");
            return Ok(WebhookOutcome::NoReference);
        }

        for (idx, candidate) in candidates.iter().enumerate() {
            let snapshot = match self.paypal.fetch_subscription(candidate).await {
                Ok(snapshot) => snapshot,
                Err(AppError::NotFound(_) | AppError::ValidationError(_)) => {
                    let remaining = candidates.len() - idx - 1;
                    log::warn!(
                        "Webhook reference {candidate} is not a PayPal subscription ({remaining} left)"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = snapshot
                .status
                .clone()
                .or_else(|| view.event_type().map(str::to_string));
            let write = self.converge(candidate, &snapshot, status).await?;
            if write == LedgerWrite::NoMatchingRow {
                log::info!("No local row for subscription {candidate}, acknowledging anyway");
            }
            return Ok(WebhookOutcome::Applied {
                subscription_id: candidate.to_string(),
                write,
            });
        }

        Ok(WebhookOutcome::NoReference)
    }

    async fn converge(
        &self,
        subscription_id: &str,
        snapshot: &RemoteSubscription,
        status: Option<String>,
    ) -> AppResult<LedgerWrite> {
        self.ledger
            .upsert_by_external_id(LedgerUpsert {
                paypal_subscription_id: subscription_id.to_string(),
                status,
                started_at: snapshot.start_time,
                remote_updated_at: snapshot.update_time,
                snapshot: snapshot.raw.clone(),
                owner: None,
            })
            .await
    }
}
