//! Database models for worker models.

use crate::api::models::worker_models::WorkerModelSpec;
use crate::policy::engine::PreparedWorkerModel;
use crate::types::{GroupId, UserId, WorkerModelId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database request for creating a new worker model
#[derive(Debug, Clone)]
pub struct WorkerModelCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub group_id: GroupId,
    pub spec: WorkerModelSpec,
    pub restricted: bool,
    pub provision: i32,
    pub pattern_name: Option<String>,
    pub registered_capabilities: Vec<String>,
    pub is_deprecated: bool,
    pub disabled: bool,
    pub is_official: bool,
    pub created_by: UserId,
}

impl WorkerModelCreateDBRequest {
    pub fn new(created_by: UserId, prepared: PreparedWorkerModel) -> Self {
        Self {
            name: prepared.name,
            description: prepared.description,
            group_id: prepared.group_id,
            spec: prepared.spec,
            restricted: prepared.restricted,
            provision: prepared.provision,
            pattern_name: prepared.pattern_name,
            registered_capabilities: prepared.registered_capabilities,
            is_deprecated: prepared.is_deprecated,
            disabled: prepared.disabled,
            is_official: prepared.is_official,
            created_by,
        }
    }
}

/// Database request for replacing a worker model's definition.
///
/// Scheduler-owned fields (spawn errors, registration state) are left untouched.
#[derive(Debug, Clone)]
pub struct WorkerModelUpdateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub group_id: GroupId,
    pub spec: WorkerModelSpec,
    pub restricted: bool,
    pub provision: i32,
    pub pattern_name: Option<String>,
    pub registered_capabilities: Vec<String>,
    pub is_deprecated: bool,
    pub disabled: bool,
    pub is_official: bool,
}

impl From<PreparedWorkerModel> for WorkerModelUpdateDBRequest {
    fn from(prepared: PreparedWorkerModel) -> Self {
        Self {
            name: prepared.name,
            description: prepared.description,
            group_id: prepared.group_id,
            spec: prepared.spec,
            restricted: prepared.restricted,
            provision: prepared.provision,
            pattern_name: prepared.pattern_name,
            registered_capabilities: prepared.registered_capabilities,
            is_deprecated: prepared.is_deprecated,
            disabled: prepared.disabled,
            is_official: prepared.is_official,
        }
    }
}

/// Database response for a worker model.
///
/// Serializable so list results can be held in the shared cache; it has no `editable`
/// field, so a cached entry can never leak one caller's rights to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerModelDBResponse {
    pub id: WorkerModelId,
    pub name: String,
    pub description: Option<String>,
    pub group_id: GroupId,
    pub spec: WorkerModelSpec,
    pub restricted: bool,
    pub provision: i32,
    pub pattern_name: Option<String>,
    pub registered_capabilities: Vec<String>,
    pub is_deprecated: bool,
    pub disabled: bool,
    pub is_official: bool,
    pub nb_spawn_err: i32,
    pub last_spawn_err: Option<String>,
    pub need_registration: bool,
    pub last_registration: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
