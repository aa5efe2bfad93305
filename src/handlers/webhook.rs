use crate::error::AppError;
use crate::external::WebhookSignatureHeaders;
use crate::models::{ErrorBody, WebhookAck, WebhookEventDoc};
use crate::services::SubscriptionSyncService;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::error;
use serde_json::Value;

/// PayPal webhook receiver
///
/// Verifies the delivery with PayPal, then re-fetches the referenced
/// subscription and converges the local row. Deliveries that pass
/// verification are acknowledged even when no local row matches, otherwise
/// PayPal keeps retransmitting them.
#[utoipa::path(
    post,
    path = "/api/paypal/webhook",
    tag = "webhook",
    request_body = WebhookEventDoc,
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Invalid signature or body", body = ErrorBody),
        (status = 502, description = "PayPal failure, PayPal will redeliver", body = ErrorBody)
    )
)]
pub async fn paypal_webhook(
    req: HttpRequest,
    body: web::Bytes,
    sync_service: web::Data<SubscriptionSyncService>,
) -> Result<HttpResponse> {
    let event: Value = serde_json::from_slice(&body).map_err(|e| {
        error!("Webhook body is not JSON: {e}");
        AppError::ValidationError("Invalid webhook payload".to_string())
    })?;

    let headers = WebhookSignatureHeaders::from_lookup(|name| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let outcome = sync_service.ingest_webhook(&event, &headers).await?;
    log::debug!("Webhook outcome: {outcome:?}");

    Ok(HttpResponse::Ok().json(WebhookAck { received: true }))
}
