//! Database models for pipelines consuming worker models.

use crate::types::{PipelineId, ProjectId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database response for a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PipelineDBResponse {
    pub id: PipelineId,
    pub name: String,
    pub project_id: ProjectId,
    pub project_key: String,
}
