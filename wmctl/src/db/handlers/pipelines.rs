//! Read-only access to the pipelines requiring a worker model.

use crate::db::{errors::Result, models::pipelines::PipelineDBResponse};
use crate::types::{GroupId, WorkerModelId, abbrev_uuid};
use sqlx::{PgConnection, query_builder::QueryBuilder};
use tracing::instrument;

pub struct Pipelines<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Pipelines<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Pipelines requiring `worker_model_id`, optionally limited to projects on which one of
    /// `group_ids` holds a permission.
    #[instrument(skip(self, group_ids), fields(worker_model_id = %abbrev_uuid(&worker_model_id)), err)]
    pub async fn list_using_worker_model(
        &mut self,
        worker_model_id: WorkerModelId,
        group_ids: Option<&[GroupId]>,
    ) -> Result<Vec<PipelineDBResponse>> {
        let mut query = QueryBuilder::new(
            r#"
            SELECT DISTINCT p.id, p.name, p.project_id, pr.key AS project_key
            FROM pipelines p
            JOIN projects pr ON pr.id = p.project_id
            JOIN pipeline_worker_models pwm ON pwm.pipeline_id = p.id
            WHERE pwm.worker_model_id =
            "#,
        );
        query.push_bind(worker_model_id);

        if let Some(group_ids) = group_ids {
            query.push(" AND EXISTS (SELECT 1 FROM project_groups pg WHERE pg.project_id = p.project_id AND pg.group_id = ANY(");
            query.push_bind(group_ids.to_vec());
            query.push("))");
        }

        query.push(" ORDER BY project_key, p.name");

        let pipelines = query
            .build_query_as::<PipelineDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;

        Ok(pipelines)
    }
}
