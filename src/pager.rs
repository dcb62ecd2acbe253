//! Keyset pagination over a user's task list.
//!
//! Tasks are shown highest priority first, newest first within a priority:
//! `(priority ASC, id DESC)`. Because that order spans two columns, "after the
//! cursor" cannot be a single `id < cursor` filter. The cursor carries only the
//! last task id; its priority is looked up again on every request, and the
//! continuation filter is
//! `priority > p OR (priority = p AND id < cursor)`.

use crate::models::{Priority, Task, TaskId, UserId};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Position of a task in the page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub priority: Priority,
    pub id: TaskId,
}

impl SortKey {
    pub fn of(task: &Task) -> Self {
        SortKey {
            priority: task.priority,
            id: task.id,
        }
    }

    /// Whether `self` comes strictly after `cursor` in the page order.
    pub fn is_after(&self, cursor: &SortKey) -> bool {
        self > cursor
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Read access the pager needs from the task store.
pub trait TaskSource {
    type Error: fmt::Display;

    /// Position of task `cursor` if it exists and belongs to `user_id`.
    fn cursor_position(
        &self,
        user_id: UserId,
        cursor: TaskId,
    ) -> Result<Option<SortKey>, Self::Error>;

    /// Up to `fetch` of the user's tasks in page order, starting strictly after
    /// `after` (or from the beginning when `None`).
    fn fetch_after(
        &self,
        user_id: UserId,
        after: Option<SortKey>,
        fetch: usize,
    ) -> Result<Vec<Task>, Self::Error>;
}

impl<T: TaskSource + ?Sized> TaskSource for &T {
    type Error = T::Error;

    fn cursor_position(&self, user_id: UserId, cursor: TaskId) -> Result<Option<SortKey>, T::Error> {
        (**self).cursor_position(user_id, cursor)
    }

    fn fetch_after(
        &self,
        user_id: UserId,
        after: Option<SortKey>,
        fetch: usize,
    ) -> Result<Vec<Task>, T::Error> {
        (**self).fetch_after(user_id, after, fetch)
    }
}

/// What to do when a cursor names a task that is gone (or not the caller's).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorPolicy {
    /// Ignore the cursor and serve the first page.
    #[default]
    Restart,
    /// Fail with [`PagerError::CursorStale`].
    Reject,
}

impl FromStr for CursorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(CursorPolicy::Restart),
            "reject" => Ok(CursorPolicy::Reject),
            _ => Err(format!("Invalid cursor policy: {}", s)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PagerError {
    #[error("Page limit must be at least 1")]
    InvalidLimit,

    #[error("Pagination cursor {0} no longer refers to a task")]
    CursorStale(TaskId),

    #[error("Task store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub tasks: Vec<Task>,
    pub next_cursor: Option<TaskId>,
    pub has_more: bool,
}

pub struct TaskPager<S> {
    source: S,
    policy: CursorPolicy,
}

impl<S: TaskSource> TaskPager<S> {
    pub fn new(source: S, policy: CursorPolicy) -> Self {
        TaskPager { source, policy }
    }

    /// Fetch the page of `user_id`'s tasks that follows `cursor`.
    ///
    /// Each call reads the store independently; tasks inserted between calls
    /// may or may not show up on later pages.
    pub fn page(
        &self,
        user_id: UserId,
        cursor: Option<TaskId>,
        limit: usize,
    ) -> Result<Page, PagerError> {
        if limit == 0 {
            return Err(PagerError::InvalidLimit);
        }

        let after = match cursor {
            None => None,
            Some(cursor_id) => {
                let position = self
                    .source
                    .cursor_position(user_id, cursor_id)
                    .map_err(|e| PagerError::Store(e.to_string()))?;

                match (position, self.policy) {
                    (Some(position), _) => Some(position),
                    (None, CursorPolicy::Restart) => {
                        tracing::debug!(user_id, cursor = cursor_id, "Stale cursor, restarting from first page");
                        None
                    }
                    (None, CursorPolicy::Reject) => return Err(PagerError::CursorStale(cursor_id)),
                }
            }
        };

        // One extra row tells us whether another page exists
        let mut tasks = self
            .source
            .fetch_after(user_id, after, limit.saturating_add(1))
            .map_err(|e| PagerError::Store(e.to_string()))?;

        let has_more = tasks.len() > limit;
        if has_more {
            tasks.truncate(limit);
        }
        let next_cursor = if has_more {
            tasks.last().map(|t| t.id)
        } else {
            None
        };

        Ok(Page {
            tasks,
            next_cursor,
            has_more,
        })
    }
}
