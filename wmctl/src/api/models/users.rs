//! The authenticated caller and its platform role.

use crate::db::models::groups::GroupMembership;
use crate::types::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Platform-wide role of a caller.
///
/// Admins may do anything. Maintainers see every worker model but only mutate those of their
/// own groups. Members are confined to their groups plus the shared infrastructure group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Maintainer,
    Member,
}

/// The security principal of the current request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub role: Role,
    #[schema(value_type = Vec<Object>)]
    pub memberships: Vec<GroupMembership>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_maintainer(&self) -> bool {
        self.role == Role::Maintainer
    }

    pub fn is_group_member(&self, group_id: GroupId) -> bool {
        self.memberships.iter().any(|m| m.group_id == group_id)
    }

    pub fn is_group_admin(&self, group_id: GroupId) -> bool {
        self.memberships.iter().any(|m| m.group_id == group_id && m.is_group_admin)
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.memberships.iter().map(|m| m.group_id)
    }
}
