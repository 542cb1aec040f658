//! `GET /v1/models`: the configured model list.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let data: Vec<_> = state
        .config
        .llm
        .available_models()
        .into_iter()
        .map(|id| json!({ "id": id, "object": "model", "owned_by": "config" }))
        .collect();

    Json(json!({
        "object": "list",
        "data": data,
        "default": state.default_model(),
    }))
}
