//! Read-only access to projects and the groups holding permissions on them.

use crate::db::{errors::Result, models::projects::ProjectDBResponse};
use crate::types::{GroupId, ProjectId};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct Project {
    pub id: ProjectId,
    pub key: String,
    pub name: String,
    pub group_ids: Vec<GroupId>,
}

pub struct Projects<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Projects<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_key(&mut self, key: &str) -> Result<Option<ProjectDBResponse>> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.key, p.name,
                   COALESCE(array_agg(pg.group_id) FILTER (WHERE pg.group_id IS NOT NULL), '{}') AS group_ids
            FROM projects p
            LEFT JOIN project_groups pg ON pg.project_id = p.id
            WHERE p.key = $1
            GROUP BY p.id
            "#,
        )
        .bind(key)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(project.map(|p| ProjectDBResponse {
            id: p.id,
            key: p.key,
            name: p.name,
            group_ids: p.group_ids,
        }))
    }
}
