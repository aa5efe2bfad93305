pub mod subscription;
pub mod webhook;

pub use subscription::PublicBaseUrl;

use crate::models::HealthResponse;
use actix_web::{HttpResponse, web};

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub fn paypal_config(cfg: &mut web::ServiceConfig) {
    // resources rather than routes so a wrong method answers 405
    cfg.service(
        web::scope("/api/paypal")
            .service(
                web::resource("/create-subscription")
                    .route(web::post().to(subscription::create_subscription)),
            )
            .service(
                web::resource("/sync-subscription")
                    .route(web::get().to(subscription::sync_subscription))
                    .route(web::post().to(subscription::sync_subscription)),
            )
            .service(web::resource("/webhook").route(web::post().to(webhook::paypal_webhook))),
    )
    .service(web::resource("/health").route(web::get().to(health)));
}
