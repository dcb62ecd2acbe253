//! User and task queries.

use super::db::{Database, DbError};
use crate::auth::address::Address;
use crate::models::{NewTask, Priority, Task, TaskId, TaskStatus, UserId, UserRow};
use crate::pager::{SortKey, TaskSource};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub const MAX_TITLE_CHARS: usize = 200;

const TASK_COLUMNS: &str =
    "id, user_id, title, description, priority, status, deadline, created_at, updated_at";

/// A task id checked to belong to a specific user.
///
/// Only [`Database::authorize_task`] can build one, so mutating queries that
/// take it never act on another user's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedTask {
    user_id: UserId,
    id: TaskId,
}

impl AuthorizedTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Database {
    // -- Users --

    /// Look up the user for a wallet, creating it on first sign-in.
    /// Returns the row and whether it was created by this call.
    pub fn get_or_create_user(&self, address: &Address) -> Result<(UserRow, bool), DbError> {
        let wallet = address.to_checksum();
        let username = default_username(&wallet);

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (wallet_address, username, is_active, created_at)
                 VALUES (?1, ?2, 1, ?3)",
                params![wallet, username, Utc::now()],
            )?;

            let user = conn.query_row(
                "SELECT id, wallet_address, username, is_active, created_at
                 FROM users WHERE wallet_address = ?1",
                [&wallet],
                map_user,
            )?;
            Ok((user, inserted == 1))
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, wallet_address, username, is_active, created_at
                     FROM users WHERE id = ?1",
                    [id],
                    map_user,
                )
                .optional()?)
        })
    }

    // -- Tasks --

    pub fn create_task(&self, user_id: UserId, task: &NewTask) -> Result<Task, DbError> {
        let title = task.title.trim();
        let chars = title.chars().count();
        if chars == 0 {
            return Err(DbError::InvalidTask("Title is required".to_string()));
        }
        if chars > MAX_TITLE_CHARS {
            return Err(DbError::InvalidTask(format!(
                "Title must be at most {} characters",
                MAX_TITLE_CHARS
            )));
        }

        let now = Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (user_id, title, description, priority, status, deadline, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    user_id,
                    title,
                    task.description,
                    i64::from(task.priority),
                    i64::from(task.status),
                    task.deadline,
                    now,
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_task(conn, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>, DbError> {
        self.with_conn(|conn| query_task(conn, id))
    }

    /// Check that task `id` exists and belongs to `user_id`.
    pub fn authorize_task(
        &self,
        user_id: UserId,
        id: TaskId,
    ) -> Result<Option<AuthorizedTask>, DbError> {
        self.with_conn(|conn| {
            let found: Option<TaskId> = conn
                .query_row(
                    "SELECT id FROM tasks WHERE id = ?1 AND user_id = ?2",
                    [id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.map(|id| AuthorizedTask { user_id, id }))
        })
    }

    pub fn update_task_status(
        &self,
        task: &AuthorizedTask,
        status: TaskStatus,
    ) -> Result<Option<Task>, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![i64::from(status), Utc::now(), task.id, task.user_id],
            )?;
            if changed == 0 {
                // Deleted between authorization and update
                return Ok(None);
            }
            query_task(conn, task.id)
        })
    }

    /// Returns false if the task was already gone.
    pub fn delete_task(&self, task: AuthorizedTask) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                [task.id, task.user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

impl TaskSource for Database {
    type Error = DbError;

    fn cursor_position(
        &self,
        user_id: UserId,
        cursor: TaskId,
    ) -> Result<Option<SortKey>, DbError> {
        self.with_conn(|conn| {
            let priority: Option<i64> = conn
                .query_row(
                    "SELECT priority FROM tasks WHERE id = ?1 AND user_id = ?2",
                    [cursor, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            match priority {
                Some(p) => {
                    let priority =
                        Priority::try_from(p).map_err(|e| conversion_error(0, Type::Integer, e))?;
                    Ok(Some(SortKey {
                        priority,
                        id: cursor,
                    }))
                }
                None => Ok(None),
            }
        })
    }

    fn fetch_after(
        &self,
        user_id: UserId,
        after: Option<SortKey>,
        fetch: usize,
    ) -> Result<Vec<Task>, DbError> {
        let fetch = i64::try_from(fetch).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let tasks = match after {
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TASK_COLUMNS} FROM tasks
                         WHERE user_id = ?1
                         ORDER BY priority ASC, id DESC
                         LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![user_id, fetch], map_task)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
                Some(key) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TASK_COLUMNS} FROM tasks
                         WHERE user_id = ?1
                           AND (priority > ?2 OR (priority = ?2 AND id < ?3))
                         ORDER BY priority ASC, id DESC
                         LIMIT ?4"
                    ))?;
                    let rows = stmt.query_map(
                        params![user_id, i64::from(key.priority), key.id, fetch],
                        map_task,
                    )?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(tasks)
        })
    }
}

fn default_username(checksum: &str) -> String {
    let prefix: String = checksum.chars().take(10).collect();
    format!("user_{}", prefix)
}

fn query_task(conn: &Connection, id: TaskId) -> Result<Option<Task>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            [id],
            map_task,
        )
        .optional()?)
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    let wallet: String = row.get(1)?;
    let wallet_address = Address::parse(&wallet).map_err(|e| conversion_error(1, Type::Text, e))?;
    let is_active: i64 = row.get(3)?;
    let created_at: DateTime<Utc> = row.get(4)?;

    Ok(UserRow {
        id: row.get(0)?,
        wallet_address,
        username: row.get(2)?,
        is_active: is_active != 0,
        created_at,
    })
}

fn map_task(row: &Row) -> rusqlite::Result<Task> {
    let priority: i64 = row.get(4)?;
    let status: i64 = row.get(5)?;

    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        priority: Priority::try_from(priority)
            .map_err(|e| conversion_error(4, Type::Integer, e))?,
        status: TaskStatus::try_from(status).map_err(|e| conversion_error(5, Type::Integer, e))?,
        deadline: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
