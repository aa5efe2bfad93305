use crate::error::AppError;
use crate::middlewares::get_current_caller;
use crate::models::*;
use crate::services::SubscriptionSyncService;
use crate::utils::{resolve_base_url, subscribe_cancel_url, subscribe_return_url};
use actix_web::{HttpRequest, HttpResponse, Result, web};

/// Origin configured for return/cancel URLs; `None` derives it per request.
#[derive(Debug, Clone, Default)]
pub struct PublicBaseUrl(pub Option<String>);

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

#[utoipa::path(
    post,
    path = "/api/paypal/create-subscription",
    tag = "subscription",
    request_body = CreateSubscriptionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription created, awaiting approval", body = CreateSubscriptionResponse),
        (status = 400, description = "Missing planId or plan not found / inactive", body = ErrorBody),
        (status = 401, description = "Missing or invalid caller token", body = ErrorBody),
        (status = 422, description = "PayPal rejected the plan", body = ErrorBody),
        (status = 502, description = "PayPal failure", body = ErrorBody)
    )
)]
pub async fn create_subscription(
    sync_service: web::Data<SubscriptionSyncService>,
    public_base: web::Data<PublicBaseUrl>,
    req: HttpRequest,
    request: web::Json<CreateSubscriptionRequest>,
) -> Result<HttpResponse> {
    let plan_id = request
        .into_inner()
        .plan_id
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing planId".to_string()))?;

    let caller = get_current_caller(&req)
        .ok_or_else(|| AppError::Unauthorized("Missing auth token".to_string()))?;

    let base = resolve_base_url(
        public_base.0.as_deref(),
        header(&req, "x-forwarded-proto"),
        header(&req, "x-forwarded-host"),
        header(&req, "host"),
    );

    let resp = sync_service
        .create_subscription(
            &caller,
            &plan_id,
            &subscribe_return_url(&base),
            &subscribe_cancel_url(&base),
        )
        .await?;
    Ok(HttpResponse::Ok().json(resp))
}

#[utoipa::path(
    get,
    path = "/api/paypal/sync-subscription",
    tag = "subscription",
    params(SyncSubscriptionQuery),
    responses(
        (status = 200, description = "Local row converged with PayPal", body = SyncSubscriptionResponse),
        (status = 400, description = "Missing subscriptionId", body = ErrorBody),
        (status = 404, description = "PayPal has no such subscription", body = ErrorBody),
        (status = 502, description = "PayPal failure", body = ErrorBody)
    )
)]
pub async fn sync_subscription(
    sync_service: web::Data<SubscriptionSyncService>,
    query: web::Query<SyncSubscriptionQuery>,
) -> Result<HttpResponse> {
    let subscription_id = query
        .into_inner()
        .subscription_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing subscriptionId".to_string()))?;

    let resp = sync_service.sync_subscription(&subscription_id).await?;
    Ok(HttpResponse::Ok().json(resp))
}
