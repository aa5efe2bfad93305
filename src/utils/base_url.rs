//! Origin used to build PayPal return/cancel URLs.

/// Picks the configured public origin, falling back to the proxy headers
/// of the incoming request.
pub fn resolve_base_url(
    configured: Option<&str>,
    forwarded_proto: Option<&str>,
    forwarded_host: Option<&str>,
    host: Option<&str>,
) -> String {
    if let Some(base) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        return base.trim_end_matches('/').to_string();
    }
    let proto = forwarded_proto
        .and_then(|p| p.split(',').next())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("http");
    let host = forwarded_host
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .or(host)
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

pub fn subscribe_return_url(base: &str) -> String {
    format!("{base}/account/subscribe/success")
}

pub fn subscribe_cancel_url(base: &str) -> String {
    format!("{base}/account/subscribe/cancel")
}
