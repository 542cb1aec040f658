pub mod models;
pub mod openai_compat;
pub mod skills;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use sr_domain::config::CorsConfig;

use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/models", get(models::list_models))
        .route("/v1/chat/completions", post(openai_compat::chat_completions))
        .route("/v1/confirm_create_skill", post(skills::confirm_create_skill))
}

/// The router with CORS, the concurrency limit and state attached.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    let limit = state.config.server.max_concurrent_requests;
    router()
        .layer(tower::limit::ConcurrencyLimitLayer::new(limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build a CORS layer from the configured allowed origins.
///
/// `"*"` allows any origin. Entries ending in `:*` match that scheme and
/// host on any port (e.g. `http://localhost:*`).
pub fn build_cors_layer(cors_config: &CorsConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    if cors_config.allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut prefixes: Vec<String> = Vec::new();
    for origin in &cors_config.allowed_origins {
        if let Some(prefix) = origin.strip_suffix(":*") {
            prefixes.push(format!("{prefix}:"));
        } else if let Ok(value) = origin.parse::<HeaderValue>() {
            exact.push(value);
        } else {
            tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
        }
    }

    let allow_origin = if prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            if exact.iter().any(|e| e == origin) {
                return true;
            }
            let Ok(origin) = origin.to_str() else {
                return false;
            };
            prefixes.iter().any(|prefix| {
                origin
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(methods)
        .allow_headers(headers)
}
