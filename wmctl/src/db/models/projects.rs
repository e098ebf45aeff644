//! Database models for projects.

use crate::types::{GroupId, ProjectId};
use serde::{Deserialize, Serialize};

/// Database response for a project, with the groups holding permissions on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDBResponse {
    pub id: ProjectId,
    pub key: String,
    pub name: String,
    pub group_ids: Vec<GroupId>,
}
