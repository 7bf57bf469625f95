use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use utoipa::ToSchema;
use uuid::Uuid;

/// Position of a turn inside its conversation, starting at 0.
pub type TurnId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnRole {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnStatus {
    Complete,
    /// Generation was aborted; the content is what the client saw.
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Turn {
    #[serde(skip_serializing)]
    pub conversation_id: Uuid,
    pub turn_order: TurnId,
    pub role: TurnRole,
    pub content: String,
    pub status: TurnStatus,
    pub created_at: NaiveDateTime,
}

/// A turn that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: TurnRole,
    pub content: String,
    pub status: TurnStatus,
}

impl NewTurn {
    #[must_use]
    pub fn user(content: String) -> Self {
        Self {
            role: TurnRole::User,
            content,
            status: TurnStatus::Complete,
        }
    }

    #[must_use]
    pub fn agent(content: String, status: TurnStatus) -> Self {
        Self {
            role: TurnRole::Agent,
            content,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_serialize_turn() {
        let created_at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .and_then(|date| date.and_hms_opt(8, 30, 0))
            .unwrap();
        let turn = Turn {
            conversation_id: Uuid::new_v4(),
            turn_order: 3,
            role: TurnRole::Agent,
            content: "Sure,".to_owned(),
            status: TurnStatus::Partial,
            created_at,
        };
        assert_eq!(
            serde_json::to_string(&turn).unwrap(),
            r#"{"turn_order":3,"role":"agent","content":"Sure,","status":"partial","created_at":"2025-03-01T08:30:00"}"#
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TurnStatus::Complete.to_string(), "complete");
        assert_eq!(TurnRole::Agent.as_ref(), "agent");
    }
}
