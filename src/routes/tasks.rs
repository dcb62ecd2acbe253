//! Task API endpoints. All of them require a bearer session and only ever
//! see the caller's own tasks.

use super::with_db;
use crate::auth::middleware::{AppState, AuthSession};
use crate::error::AppError;
use crate::models::{
    CreateTaskRequest, NewTask, PaginationInfo, Priority, TaskId, TaskPageQuery,
    TaskPageResponse, TaskResponse, TaskStatus, UpdateTaskRequest,
};
use crate::pager::TaskPager;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// Parse an optional positive integer query parameter. Empty counts as absent.
fn parse_positive(value: Option<&str>, label: &str) -> Result<Option<i64>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(AppError::BadRequest(format!(
                "{} must be a positive integer",
                label
            ))),
        },
    }
}

/// GET /api/tasks?cursor=&limit=: One page of the caller's tasks
pub async fn list_tasks(
    session: AuthSession,
    State(state): State<AppState>,
    Query(query): Query<TaskPageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let cursor: Option<TaskId> = parse_positive(query.cursor.as_deref(), "cursor")?;
    let limit = match parse_positive(query.limit.as_deref(), "limit")? {
        Some(n) => usize::try_from(n)
            .unwrap_or(usize::MAX)
            .min(state.config.max_tasks_per_page),
        None => state.config.tasks_per_page,
    };

    let user_id = session.user_id;
    let policy = state.config.stale_cursor_policy;
    let page = with_db(&state.db, move |db| {
        Ok(TaskPager::new(db, policy).page(user_id, cursor, limit)?)
    })
    .await?;

    tracing::debug!(
        user_id,
        cursor = ?cursor,
        limit,
        returned = page.tasks.len(),
        has_more = page.has_more,
        "Task page served"
    );

    Ok(Json(TaskPageResponse {
        success: true,
        tasks: page.tasks,
        pagination: PaginationInfo {
            has_more: page.has_more,
            next_cursor: page.next_cursor,
        },
    }))
}

/// POST /api/tasks: Create a task owned by the caller
pub async fn create_task(
    session: AuthSession,
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let new_task = NewTask {
        title: req.title,
        description: req
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        priority: req.priority.unwrap_or(Priority::Low),
        status: req.status.unwrap_or(TaskStatus::Active),
        deadline: req.deadline,
    };

    let user_id = session.user_id;
    let task = with_db(&state.db, move |db| Ok(db.create_task(user_id, &new_task)?)).await?;

    tracing::info!(action = "task_created", user_id, task_id = task.id, "Task created");

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            success: true,
            task,
        }),
    ))
}

/// PATCH /api/tasks/{id}: Change the status of one of the caller's tasks
pub async fn update_task_status(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = session.user_id;

    // Someone else's task and a missing task look the same to the caller
    let updated = with_db(&state.db, move |db| {
        let Some(handle) = db.authorize_task(user_id, id)? else {
            return Ok(None);
        };
        Ok(db.update_task_status(&handle, req.status)?)
    })
    .await?;

    let task = updated.ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

    tracing::info!(
        action = "task_status_changed",
        user_id,
        task_id = task.id,
        status = ?task.status,
        "Task status updated"
    );

    Ok(Json(TaskResponse {
        success: true,
        task,
    }))
}
