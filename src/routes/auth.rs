//! Auth API endpoints.

use super::with_db;
use crate::auth::middleware::{AppState, AuthSession};
use crate::auth::session::generate_session_token;
use crate::error::AppError;
use crate::models::{
    ChallengeRequest, ChallengeResponse, StoredSession, VerifyRequest, VerifyResponse,
};
use crate::storage::bounded;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

/// Trimmed value of a required request field; absent and blank are rejected alike.
fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

/// POST /api/auth/challenge: Issue a message for the wallet to sign
pub async fn request_challenge(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let address = required(req.address.as_deref(), "Address is required")?;

    let message = state.auth.issue_challenge(address).await?;

    Ok(Json(ChallengeResponse {
        success: true,
        message,
    }))
}

/// POST /api/auth/verify: Verify signature and create session
pub async fn verify_challenge(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let address = required(req.address.as_deref(), "Address is required")?;
    let signature = required(req.signature.as_deref(), "Signature is required")?;

    let result = match state.auth.verify(address, signature).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(action = "auth_failed", kind = ?e.kind(), error = %e, "Verification failed");
            return Err(e.into());
        }
    };
    let address = result.identity;

    let (user, created) = with_db(&state.db, move |db| Ok(db.get_or_create_user(&address)?)).await?;
    if created {
        tracing::info!(action = "user_created", user_id = user.id, address = %address, "New wallet user");
    }
    if !user.is_active {
        tracing::warn!(action = "auth_denied", user_id = user.id, "Inactive user");
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }

    let token = generate_session_token();
    let session = StoredSession {
        token: token.clone(),
        user_id: user.id,
        address,
        created_at: Utc::now(),
    };
    bounded(
        state.config.store_timeout(),
        state.sessions.put_session(&session, state.config.session_ttl()),
    )
    .await?;

    tracing::info!(action = "auth_success", user_id = user.id, address = %address, "User authenticated");

    Ok(Json(VerifyResponse {
        success: true,
        address,
        token,
    }))
}

/// POST /api/auth/logout: Invalidate current session
pub async fn logout(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    bounded(
        state.config.store_timeout(),
        state.sessions.delete_session(&session.token),
    )
    .await?;

    tracing::info!(action = "logout", user_id = session.user_id, "User logged out");

    Ok(StatusCode::NO_CONTENT)
}
