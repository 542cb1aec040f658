//! Skill creation confirmation over HTTP.
//!
//! This is the user-facing boundary for the two-phase creation flow: the
//! model can only propose, a client confirms here with the token it was
//! shown.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmCreateSkillRequest {
    pub confirmation_token: String,
}

/// `POST /v1/confirm_create_skill`
///
/// Always answers 200; failure is described by the outcome payload.
pub async fn confirm_create_skill(
    State(state): State<AppState>,
    Json(body): Json<ConfirmCreateSkillRequest>,
) -> impl IntoResponse {
    let outcome = state
        .dispatcher
        .confirm_creation(&body.confirmation_token)
        .await;
    Json(outcome)
}
