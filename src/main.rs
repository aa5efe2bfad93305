use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use subsync_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::PayPalClient,
    handlers::{self, PublicBaseUrl},
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration");
    config.warn_on_incomplete();

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(&config.jwt);
    let paypal = PayPalClient::new(&config.paypal).expect("Failed to build PayPal client");
    log::info!("Using PayPal API at {}", config.paypal.api_base());

    let plan_service: Arc<dyn PlanRegistry> = Arc::new(PlanService::new(pool.clone()));
    let ledger_service: Arc<dyn SubscriptionLedger> = Arc::new(LedgerService::new(pool.clone()));
    let sync_service = SubscriptionSyncService::new(paypal, plan_service, ledger_service);
    let public_base = PublicBaseUrl(config.paypal.public_base_url.clone());

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors(&cors_config))
            .wrap(Logger::default())
            .app_data(web::Data::new(sync_service.clone()))
            .app_data(web::Data::new(public_base.clone()))
            .configure(swagger_config)
            .configure(handlers::paypal_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
