use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;

/// Service-level auth for the API surface. User-level authentication is the
/// upstream gateway's job; this only keeps the port from being an open relay.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_token else {
        // No token configured: allow open access only on loopback.
        let is_loopback = state.api_host == "127.0.0.1"
            || state.api_host == "::1"
            || state.api_host == "localhost";
        if is_loopback {
            return next.run(req).await;
        }
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "No API token configured. Set [api] token before exposing on a non-loopback address."
            })),
        )
            .into_response();
    };

    // Internal header bypass for service-to-service calls
    if let Some(header) = req.headers().get("x-mailient-internal-token") {
        if let Ok(val) = header.to_str() {
            if val == expected {
                return next.run(req).await;
            }
        }
    }

    let bearer = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match bearer {
        Some(token) if token == expected => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Missing or invalid Authorization header. Use: Bearer <token>"
            })),
        )
            .into_response(),
    }
}
