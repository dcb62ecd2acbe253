//! Shared application state and the bearer-session extractor.

use crate::auth::address::Address;
use crate::auth::protocol::AuthProtocol;
use crate::config::Config;
use crate::error::AppError;
use crate::models::UserId;
use crate::storage::db::Database;
use crate::storage::{bounded, SessionStore};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthProtocol>,
    pub sessions: Arc<dyn SessionStore>,
    pub db: Arc<Database>,
    pub config: Arc<Config>,
}

/// Authenticated session extractor.
///
/// Extracts session from `Authorization: Bearer {token}` header.
/// Returns 401 Unauthorized if missing or invalid.
pub struct AuthSession {
    pub user_id: UserId,
    pub address: Address,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        // Parse Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?
            .to_string();

        // Look up session
        let session = bounded(
            state.config.store_timeout(),
            state.sessions.get_session(&token),
        )
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

        Ok(AuthSession {
            user_id: session.user_id,
            address: session.address,
            token,
        })
    }
}
