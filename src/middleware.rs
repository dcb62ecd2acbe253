//! Response header middleware for the JSON API.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Middleware that adds API response headers.
///
/// - **Cache-Control: no-store**: responses carry session tokens and
///   per-user task data.
/// - **X-Content-Type-Options: nosniff**
/// - **Referrer-Policy: no-referrer**
pub async fn api_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    response
}
