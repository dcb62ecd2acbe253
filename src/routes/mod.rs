//! API route handlers.

pub mod auth;
pub mod tasks;

use crate::auth::middleware::AppState;
use crate::error::AppError;
use crate::storage::db::Database;
use axum::{routing::patch, routing::post, Router};
use std::sync::Arc;

/// Run a database closure on the blocking pool.
pub(crate) async fn with_db<T, F>(db: &Arc<Database>, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, AppError> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| AppError::Internal(format!("spawn_blocking join error: {}", e)))?
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/api/auth/challenge", post(auth::request_challenge))
        .route("/api/auth/verify", post(auth::verify_challenge))
        .route("/api/auth/logout", post(auth::logout))
        // Task endpoints
        .route(
            "/api/tasks",
            axum::routing::get(tasks::list_tasks).post(tasks::create_task),
        )
        .route("/api/tasks/{id}", patch(tasks::update_task_status))
}
