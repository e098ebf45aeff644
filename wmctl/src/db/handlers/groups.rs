//! Read access to groups and memberships.
//!
//! Groups are administered elsewhere; the catalog only resolves them and, at startup, ensures the
//! shared infrastructure group exists.

use crate::db::{
    errors::Result,
    models::groups::{GroupDBResponse, GroupMembership},
};
use crate::types::{GroupId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Group> for GroupDBResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
            created_at: group.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Membership {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub is_group_admin: bool,
}

pub struct Groups<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Groups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: GroupId) -> Result<Option<GroupDBResponse>> {
        let group = sqlx::query_as::<_, Group>("SELECT id, name, created_at FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(group.map(GroupDBResponse::from))
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<GroupDBResponse>> {
        let group = sqlx::query_as::<_, Group>("SELECT id, name, created_at FROM groups WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(group.map(GroupDBResponse::from))
    }

    /// Return the group called `name`, creating it if needed
    #[instrument(skip(self), err)]
    pub async fn ensure(&mut self, name: &str) -> Result<GroupDBResponse> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, created_at
            "#,
        )
        .bind(name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(GroupDBResponse::from(group))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn memberships_for_user(&mut self, user_id: UserId) -> Result<Vec<GroupMembership>> {
        let rows = sqlx::query_as::<_, Membership>(
            "SELECT group_id, user_id, is_group_admin FROM group_memberships WHERE user_id = $1 ORDER BY group_id",
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|m| GroupMembership {
                group_id: m.group_id,
                user_id: m.user_id,
                is_group_admin: m.is_group_admin,
            })
            .collect())
    }
}
