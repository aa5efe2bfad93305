use crate::error::AppError;
use crate::utils::{CallerIdentity, JwtService};
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

// Paths reachable without a caller token
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec![
                "/health",
                "/swagger-ui",
                "/api-docs/openapi.json",
                // PayPal calls this one; it is gated by signature verification instead
                "/api/paypal/webhook",
                "/api/paypal/sync-subscription",
            ],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        if self.public_paths.is_public_path(req.path()) {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let Some(token) = token else {
            let error = AppError::Unauthorized("Missing auth token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        match self.jwt_service.verify_caller_token(token) {
            Ok(caller) => {
                req.extensions_mut().insert(caller);
                Box::pin(self.service.call(req))
            }
            Err(e) => {
                log::warn!("Rejected caller token on {}: {e}", req.path());
                let error = AppError::Unauthorized("Invalid user token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// Caller attached by `AuthMiddleware`, if the request passed through it.
pub fn get_current_caller(req: &actix_web::HttpRequest) -> Option<CallerIdentity> {
    req.extensions().get::<CallerIdentity>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path("/api/paypal/webhook"));
        assert!(paths.is_public_path("/api/paypal/sync-subscription"));
        assert!(paths.is_public_path("/swagger-ui/index.html"));
        assert!(paths.is_public_path("/health"));
        assert!(!paths.is_public_path("/api/paypal/create-subscription"));
        assert!(!paths.is_public_path("/api/paypal/webhook/extra"));
    }
}
