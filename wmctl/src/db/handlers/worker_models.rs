//! Database repository for worker models.

use crate::api::models::worker_models::{StateFilter, WorkerModelSpec};
use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::worker_models::{WorkerModelCreateDBRequest, WorkerModelDBResponse, WorkerModelUpdateDBRequest},
};
use crate::types::{GroupId, UserId, WorkerModelId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, query_builder::QueryBuilder, types::Json};
use tracing::instrument;

/// Filter for listing worker models
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerModelFilter {
    /// Restrict to models owned by these groups; `None` means no restriction
    pub group_ids: Option<Vec<GroupId>>,
    /// Substring match on registered capabilities
    pub binary: Option<String>,
    pub state: Option<StateFilter>,
    /// Only models that are neither disabled nor deprecated
    pub usable_only: bool,
}

impl WorkerModelFilter {
    pub fn new(group_ids: Option<Vec<GroupId>>) -> Self {
        Self {
            group_ids,
            ..Default::default()
        }
    }

    pub fn with_binary(mut self, binary: Option<String>) -> Self {
        self.binary = binary.filter(|b| !b.is_empty());
        self
    }

    pub fn with_state(mut self, state: Option<StateFilter>) -> Self {
        self.state = state;
        self
    }

    pub fn usable_only(mut self) -> Self {
        self.usable_only = true;
        self
    }

    /// Evaluate the filter against a single model, mirroring the SQL predicate.
    pub fn matches(&self, model: &WorkerModelDBResponse) -> bool {
        if let Some(groups) = &self.group_ids
            && !groups.contains(&model.group_id)
        {
            return false;
        }
        if let Some(binary) = &self.binary
            && !model.registered_capabilities.iter().any(|c| c.contains(binary.as_str()))
        {
            return false;
        }
        if self.usable_only && (model.disabled || model.is_deprecated) {
            return false;
        }
        match self.state {
            None => true,
            Some(StateFilter::Disabled) => model.disabled,
            Some(StateFilter::Official) => model.is_official,
            Some(StateFilter::Error) => model.nb_spawn_err > 0,
            Some(StateFilter::Register) => model.need_registration,
            Some(StateFilter::Deprecated) => model.is_deprecated,
            Some(StateFilter::Active) => !model.disabled,
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct WorkerModel {
    pub id: WorkerModelId,
    pub name: String,
    pub description: Option<String>,
    pub group_id: GroupId,
    pub spec: Json<WorkerModelSpec>,
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

impl From<WorkerModel> for WorkerModelDBResponse {
    fn from(model: WorkerModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            group_id: model.group_id,
            spec: model.spec.0,
            restricted: model.restricted,
            provision: model.provision,
            pattern_name: model.pattern_name,
            registered_capabilities: model.registered_capabilities,
            is_deprecated: model.is_deprecated,
            disabled: model.disabled,
            is_official: model.is_official,
            nb_spawn_err: model.nb_spawn_err,
            last_spawn_err: model.last_spawn_err,
            need_registration: model.need_registration,
            last_registration: model.last_registration,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct WorkerModels<'c> {
    db: &'c mut PgConnection,
}

impl<'c> WorkerModels<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look a model up by its natural key
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn get_by_group_and_name(&mut self, group_id: GroupId, name: &str) -> Result<Option<WorkerModelDBResponse>> {
        let model = sqlx::query_as::<_, WorkerModel>("SELECT * FROM worker_models WHERE group_id = $1 AND name = $2")
            .bind(group_id)
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(model.map(WorkerModelDBResponse::from))
    }
}

#[async_trait::async_trait]
impl<'c> Repository for WorkerModels<'c> {
    type CreateRequest = WorkerModelCreateDBRequest;
    type UpdateRequest = WorkerModelUpdateDBRequest;
    type Response = WorkerModelDBResponse;
    type Id = WorkerModelId;
    type Filter = WorkerModelFilter;

    #[instrument(skip(self, request), fields(name = %request.name, group_id = %abbrev_uuid(&request.group_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // created_at and updated_at use database DEFAULT NOW() for consistency
        let model = sqlx::query_as::<_, WorkerModel>(
            r#"
            INSERT INTO worker_models (
                name, description, group_id, spec, restricted, provision, pattern_name,
                registered_capabilities, is_deprecated, disabled, is_official, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.group_id)
        .bind(Json(&request.spec))
        .bind(request.restricted)
        .bind(request.provision)
        .bind(&request.pattern_name)
        .bind(&request.registered_capabilities)
        .bind(request.is_deprecated)
        .bind(request.disabled)
        .bind(request.is_official)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(WorkerModelDBResponse::from(model))
    }

    #[instrument(skip(self), fields(worker_model_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let model = sqlx::query_as::<_, WorkerModel>("SELECT * FROM worker_models WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(model.map(WorkerModelDBResponse::from))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM worker_models WHERE 1=1");

        if let Some(group_ids) = &filter.group_ids {
            query.push(" AND group_id = ANY(");
            query.push_bind(group_ids.clone());
            query.push(")");
        }

        if let Some(binary) = &filter.binary {
            query.push(" AND EXISTS (SELECT 1 FROM unnest(registered_capabilities) AS c WHERE strpos(c, ");
            query.push_bind(binary.clone());
            query.push(") > 0)");
        }

        if filter.usable_only {
            query.push(" AND disabled = false AND is_deprecated = false");
        }

        if let Some(state) = filter.state {
            query.push(match state {
                StateFilter::Disabled => " AND disabled = true",
                StateFilter::Official => " AND is_official = true",
                StateFilter::Error => " AND nb_spawn_err > 0",
                StateFilter::Register => " AND need_registration = true",
                StateFilter::Deprecated => " AND is_deprecated = true",
                StateFilter::Active => " AND disabled = false",
            });
        }

        query.push(" ORDER BY name, id");

        let models = query.build_query_as::<WorkerModel>().fetch_all(&mut *self.db).await?;

        Ok(models.into_iter().map(WorkerModelDBResponse::from).collect())
    }

    #[instrument(skip(self), fields(worker_model_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM worker_models WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(worker_model_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Scheduler-owned columns (spawn errors, registration) are never touched here
        let model = sqlx::query_as::<_, WorkerModel>(
            r#"
            UPDATE worker_models SET
                name = $2,
                description = $3,
                group_id = $4,
                spec = $5,
                restricted = $6,
                provision = $7,
                pattern_name = $8,
                registered_capabilities = $9,
                is_deprecated = $10,
                disabled = $11,
                is_official = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.group_id)
        .bind(Json(&request.spec))
        .bind(request.restricted)
        .bind(request.provision)
        .bind(&request.pattern_name)
        .bind(&request.registered_capabilities)
        .bind(request.is_deprecated)
        .bind(request.disabled)
        .bind(request.is_official)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(WorkerModelDBResponse::from(model))
    }
}
