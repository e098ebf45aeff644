//! API response models for pipelines consuming worker models.

use crate::db::models::pipelines::PipelineDBResponse;
use crate::types::{PipelineId, ProjectId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A pipeline requiring a given worker model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PipelineId,
    pub name: String,
    #[schema(value_type = String, format = "uuid")]
    pub project_id: ProjectId,
    #[schema(example = "PROJ")]
    pub project_key: String,
}

impl From<PipelineDBResponse> for PipelineResponse {
    fn from(db: PipelineDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            project_id: db.project_id,
            project_key: db.project_key,
        }
    }
}
