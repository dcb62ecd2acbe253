//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models represent challenge, session and task records.

use crate::auth::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type TaskId = i64;

// ============================================================================
// Auth Models
// ============================================================================

/// Request for authentication challenge.
#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    pub address: Option<String>,
}

/// Response containing the message to sign.
#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub success: bool,
    pub message: String,
}

/// Request to verify a signed challenge.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub address: Option<String>,
    pub signature: Option<String>, // hex, optional 0x prefix
}

/// Response after successful verification.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub address: Address,
    pub token: String,
}

// ============================================================================
// Task Models
// ============================================================================

/// Query string of `GET /api/tasks`. Both values arrive as strings and are
/// validated by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct TaskPageQuery {
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginationInfo {
    pub has_more: bool,
    pub next_cursor: Option<TaskId>,
}

#[derive(Debug, Serialize)]
pub struct TaskPageResponse {
    pub success: bool,
    pub tasks: Vec<Task>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub task: Task,
}

// ============================================================================
// Storage Models
// ============================================================================

/// Pending challenge as held by a challenge store.
///
/// At most one exists per address; a new issuance replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub nonce: String, // hex
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Session data as held by a session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user_id: UserId,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: UserId,
    pub wallet_address: Address,
    pub username: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a task; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, priority: Priority) -> Self {
        NewTask {
            title: title.into(),
            description: None,
            priority,
            status: TaskStatus::Active,
            deadline: None,
        }
    }
}

// ============================================================================
// Task Enums
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("Invalid {kind} value: {value}")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: i64,
}

/// Task priority. Lower numbers sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl TryFrom<i64> for Priority {
    type Error = InvalidEnumValue;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            _ => Err(InvalidEnumValue {
                kind: "priority",
                value,
            }),
        }
    }
}

impl From<Priority> for i64 {
    fn from(p: Priority) -> i64 {
        p as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TaskStatus {
    Active = 0,
    Completed = 1,
    Archived = 2,
}

impl TryFrom<i64> for TaskStatus {
    type Error = InvalidEnumValue;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskStatus::Active),
            1 => Ok(TaskStatus::Completed),
            2 => Ok(TaskStatus::Archived),
            _ => Err(InvalidEnumValue {
                kind: "status",
                value,
            }),
        }
    }
}

impl From<TaskStatus> for i64 {
    fn from(s: TaskStatus) -> i64 {
        s as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_challenge_expiry_boundary() {
        let issued_at = Utc::now();
        let challenge = Challenge {
            nonce: "00".to_string(),
            message: "m".to_string(),
            issued_at,
            expires_at: issued_at + Duration::minutes(5),
        };

        assert!(!challenge.is_expired(issued_at));
        assert!(!challenge.is_expired(challenge.expires_at));
        assert!(challenge.is_expired(challenge.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn test_priority_serde_as_integer() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Priority>("3").unwrap(), Priority::Low);
        assert!(serde_json::from_str::<Priority>("4").is_err());
        assert!(serde_json::from_str::<Priority>("0").is_err());
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }

    #[test]
    fn test_status_serde_as_integer() {
        assert_eq!(serde_json::to_string(&TaskStatus::Completed).unwrap(), "1");
        assert_eq!(
            serde_json::from_str::<TaskStatus>("2").unwrap(),
            TaskStatus::Archived
        );
        assert!(serde_json::from_str::<TaskStatus>("7").is_err());
    }
}
