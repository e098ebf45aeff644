//! Database models for groups and memberships.

use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database response for a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDBResponse {
    pub id: GroupId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user's membership of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: GroupId,
    pub user_id: UserId,
    /// Group administrators may delete the group's worker models
    pub is_group_admin: bool,
}
