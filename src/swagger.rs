use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::subscription::create_subscription,
        handlers::subscription::sync_subscription,
        handlers::webhook::paypal_webhook,
        handlers::health,
    ),
    components(
        schemas(
            CreateSubscriptionRequest,
            CreateSubscriptionResponse,
            SyncSubscriptionResponse,
            WebhookAck,
            WebhookEventDoc,
            ErrorBody,
            HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "subscription", description = "PayPal subscription lifecycle"),
        (name = "webhook", description = "PayPal webhook receiver"),
        (name = "health", description = "Liveness"),
    ),
    info(
        title = "Subscription Sync API",
        version = "0.1.0",
        description = "Keeps the local subscription ledger in step with PayPal"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
