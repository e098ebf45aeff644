use crate::api::models::pipelines::PipelineResponse;
use crate::api::models::users::CurrentUser;
use crate::api::models::worker_models::{
    ListWorkerModelsQuery, StateFilter, WorkerModelCommunication, WorkerModelDefinition, WorkerModelResponse, WorkerModelType,
};
use crate::cache::{context_cache_key, list_cache_key};
use crate::db::models::groups::GroupDBResponse;
use crate::db::models::worker_models::{WorkerModelCreateDBRequest, WorkerModelDBResponse, WorkerModelUpdateDBRequest};
use crate::db::store::{GroupDirectory, PipelineCatalog, WorkerModelFilter, WorkerModelStore};
use crate::errors::{Error, ErrorBody, Result};
use crate::policy::{
    engine::{authorize_delete, authorize_update, prepare_for_create, prepare_for_update},
    visibility::{VisibleGroups, authorize_group_read, resolve_visible_groups},
};
use crate::types::{GroupId, abbrev_uuid};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

/// Resolve `{group_name}/{model_name}` to the owning group and the model
async fn load_model(state: &AppState, group_name: &str, model_name: &str) -> Result<(GroupDBResponse, WorkerModelDBResponse)> {
    let group = state
        .store
        .get_group_by_name(group_name)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Group".to_string(),
            id: group_name.to_string(),
        })?;

    let model = state
        .store
        .find_worker_model(group.id, model_name)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Worker model".to_string(),
            id: format!("{group_name}/{model_name}"),
        })?;

    Ok((group, model))
}

async fn require_group(state: &AppState, group_id: GroupId) -> Result<GroupDBResponse> {
    state.store.get_group(group_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Group".to_string(),
        id: group_id.to_string(),
    })
}

/// Serve a listing through the cache, then attach the caller's `editable` flags
async fn list_with_cache(
    state: &AppState,
    caller: &CurrentUser,
    key: String,
    filter: WorkerModelFilter,
) -> Result<Vec<WorkerModelResponse>> {
    let store = state.store.clone();
    let models = state
        .cache
        .cached_list(key, || async move { Ok::<_, Error>(store.list_worker_models(&filter).await?) })
        .await?;

    Ok(models
        .into_iter()
        .map(|model| WorkerModelResponse::for_caller(model, caller))
        .collect())
}

#[utoipa::path(
    post,
    path = "/worker-models",
    tag = "worker-models",
    summary = "Create a worker model",
    description = "Non-admin callers cannot pre-provision non-restricted models and must reference a pattern; \
                   restricted models may only be created by members of the owning group.",
    request_body = WorkerModelDefinition,
    responses(
        (status = 201, description = "Worker model created", body = WorkerModelResponse),
        (status = 400, description = "Invalid definition", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Owning group not found", body = ErrorBody),
        (status = 409, description = "A model with this name already exists in the group", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_worker_model(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(definition): Json<WorkerModelDefinition>,
) -> Result<(StatusCode, Json<WorkerModelResponse>)> {
    let prepared = prepare_for_create(&current_user, definition)?;
    require_group(&state, prepared.group_id).await?;

    let mut tx = state.store.begin().await?;
    let created = tx
        .create_worker_model(&WorkerModelCreateDBRequest::new(current_user.id, prepared))
        .await?;
    tx.commit().await?;

    info!(
        worker_model_id = %abbrev_uuid(&created.id),
        name = %created.name,
        user_id = %abbrev_uuid(&current_user.id),
        "Created worker model"
    );

    state.cache.invalidate_list_cache().await;
    let response = state.cache.read_authoritative(created.id, &current_user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/worker-models",
    tag = "worker-models",
    summary = "List worker models",
    description = "Admins and maintainers see every model; other callers see the models of their groups \
                   and of the shared infrastructure group.",
    params(ListWorkerModelsQuery),
    responses(
        (status = 200, description = "Worker models visible to the caller", body = Vec<WorkerModelResponse>),
        (status = 400, description = "Unknown state filter", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_worker_models(
    State(state): State<AppState>,
    Query(query): Query<ListWorkerModelsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<WorkerModelResponse>>> {
    // Reject unknown states before touching the store or the cache
    let state_filter = query
        .state
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<StateFilter>().map_err(|value| Error::InvalidStateFilter { value }))
        .transpose()?;
    let binary = query.binary.filter(|b| !b.is_empty());

    let visible = resolve_visible_groups(&current_user, state.shared_infra_group);
    let key = list_cache_key(&visible, binary.as_deref(), state_filter);
    let filter = WorkerModelFilter::new(visible.as_filter())
        .with_binary(binary)
        .with_state(state_filter);

    let models = list_with_cache(&state, &current_user, key, filter).await?;
    Ok(Json(models))
}

#[utoipa::path(
    get,
    path = "/worker-models/{group_name}/{model_name}",
    tag = "worker-models",
    summary = "Get a worker model",
    params(
        ("group_name" = String, Path, description = "Owning group name"),
        ("model_name" = String, Path, description = "Worker model name"),
    ),
    responses(
        (status = 200, description = "Worker model", body = WorkerModelResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Group or worker model not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_worker_model(
    State(state): State<AppState>,
    Path((group_name, model_name)): Path<(String, String)>,
    current_user: CurrentUser,
) -> Result<Json<WorkerModelResponse>> {
    let (_, model) = load_model(&state, &group_name, &model_name).await?;
    Ok(Json(WorkerModelResponse::for_caller(model, &current_user)))
}

#[utoipa::path(
    put,
    path = "/worker-models/{group_name}/{model_name}",
    tag = "worker-models",
    summary = "Replace a worker model",
    description = "Non-admin callers cannot change a model's type, its type-specific configuration or its \
                   official flag; those are kept from the stored model.",
    request_body = WorkerModelDefinition,
    params(
        ("group_name" = String, Path, description = "Owning group name"),
        ("model_name" = String, Path, description = "Worker model name"),
    ),
    responses(
        (status = 200, description = "Worker model updated", body = WorkerModelResponse),
        (status = 400, description = "Invalid definition", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Group or worker model not found", body = ErrorBody),
        (status = 409, description = "A model with this name already exists in the group", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_worker_model(
    State(state): State<AppState>,
    Path((group_name, model_name)): Path<(String, String)>,
    current_user: CurrentUser,
    Json(definition): Json<WorkerModelDefinition>,
) -> Result<Json<WorkerModelResponse>> {
    let (group, existing) = load_model(&state, &group_name, &model_name).await?;
    authorize_update(&current_user, &group)?;

    let prepared = prepare_for_update(&current_user, &existing, definition)?;
    if prepared.group_id != existing.group_id {
        require_group(&state, prepared.group_id).await?;
    }

    let mut tx = state.store.begin().await?;
    let updated = tx
        .update_worker_model(existing.id, &WorkerModelUpdateDBRequest::from(prepared))
        .await?;
    tx.commit().await?;

    info!(
        worker_model_id = %abbrev_uuid(&updated.id),
        name = %updated.name,
        user_id = %abbrev_uuid(&current_user.id),
        "Updated worker model"
    );

    state.cache.invalidate_list_cache().await;
    let response = state.cache.read_authoritative(updated.id, &current_user).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/worker-models/{group_name}/{model_name}",
    tag = "worker-models",
    summary = "Delete a worker model",
    params(
        ("group_name" = String, Path, description = "Owning group name"),
        ("model_name" = String, Path, description = "Worker model name"),
    ),
    responses(
        (status = 204, description = "Worker model deleted"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Only admins and group administrators may delete", body = ErrorBody),
        (status = 404, description = "Group or worker model not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_worker_model(
    State(state): State<AppState>,
    Path((group_name, model_name)): Path<(String, String)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let (group, model) = load_model(&state, &group_name, &model_name).await?;
    authorize_delete(&current_user, &group)?;

    let mut tx = state.store.begin().await?;
    if !tx.delete_worker_model(model.id).await? {
        return Err(Error::NotFound {
            resource: "Worker model".to_string(),
            id: format!("{group_name}/{model_name}"),
        });
    }
    tx.commit().await?;

    info!(
        worker_model_id = %abbrev_uuid(&model.id),
        user_id = %abbrev_uuid(&current_user.id),
        "Deleted worker model"
    );

    state.cache.invalidate_list_cache().await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/worker-models/{group_name}/{model_name}/usage",
    tag = "worker-models",
    summary = "List pipelines using a worker model",
    description = "Admins and maintainers see every pipeline; other callers only see pipelines of projects \
                   on which one of their groups holds a permission.",
    params(
        ("group_name" = String, Path, description = "Owning group name"),
        ("model_name" = String, Path, description = "Worker model name"),
    ),
    responses(
        (status = 200, description = "Pipelines requiring the model", body = Vec<PipelineResponse>),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Group or worker model not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_worker_model_usage(
    State(state): State<AppState>,
    Path((group_name, model_name)): Path<(String, String)>,
    current_user: CurrentUser,
) -> Result<Json<Vec<PipelineResponse>>> {
    let (_, model) = load_model(&state, &group_name, &model_name).await?;

    let visible = resolve_visible_groups(&current_user, state.shared_infra_group);
    let group_filter = visible.as_filter();
    let pipelines = state.store.pipelines_using(model.id, group_filter.as_deref()).await?;

    Ok(Json(pipelines.into_iter().map(PipelineResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/projects/{project_key}/worker-models",
    tag = "worker-models",
    summary = "List worker models usable by a project",
    description = "Enabled, non-deprecated models owned by the project's groups or the shared infrastructure group.",
    params(
        ("project_key" = String, Path, description = "Project key"),
    ),
    responses(
        (status = 200, description = "Usable worker models", body = Vec<WorkerModelResponse>),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Project not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_project_worker_models(
    State(state): State<AppState>,
    Path(project_key): Path<String>,
    current_user: CurrentUser,
) -> Result<Json<Vec<WorkerModelResponse>>> {
    let project = state
        .store
        .get_project_by_key(&project_key)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Project".to_string(),
            id: project_key.clone(),
        })?;

    let visible = VisibleGroups::owned_by(project.group_ids.iter().copied(), state.shared_infra_group);
    let key = context_cache_key(&format!("project:{}", project.key), &visible);
    let filter = WorkerModelFilter::new(visible.as_filter()).usable_only();

    let models = list_with_cache(&state, &current_user, key, filter).await?;
    Ok(Json(models))
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}/worker-models",
    tag = "worker-models",
    summary = "List worker models usable by a group",
    description = "Enabled, non-deprecated models owned by the group or the shared infrastructure group. \
                   Only members of the group and admins may call this.",
    params(
        ("group_id" = String, Path, description = "Group ID"),
    ),
    responses(
        (status = 200, description = "Usable worker models", body = Vec<WorkerModelResponse>),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Caller is not a member of the group", body = ErrorBody),
        (status = 404, description = "Group not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_group_worker_models(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<WorkerModelResponse>>> {
    let group = require_group(&state, group_id).await?;
    authorize_group_read(&current_user, &group)?;

    let visible = VisibleGroups::owned_by([group.id], state.shared_infra_group);
    let key = context_cache_key(&format!("group:{}", group.id.simple()), &visible);
    let filter = WorkerModelFilter::new(visible.as_filter()).usable_only();

    let models = list_with_cache(&state, &current_user, key, filter).await?;
    Ok(Json(models))
}

#[utoipa::path(
    get,
    path = "/worker-models/types",
    tag = "worker-models",
    summary = "List worker model types",
    responses(
        (status = 200, description = "Supported worker model types", body = Vec<WorkerModelType>),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_worker_model_types(_: CurrentUser) -> Json<Vec<WorkerModelType>> {
    Json(WorkerModelType::ALL.to_vec())
}

#[utoipa::path(
    get,
    path = "/worker-models/communications",
    tag = "worker-models",
    summary = "List worker communication channels",
    responses(
        (status = 200, description = "Supported communication channels", body = Vec<WorkerModelCommunication>),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_worker_model_communications(_: CurrentUser) -> Json<Vec<WorkerModelCommunication>> {
    Json(WorkerModelCommunication::ALL.to_vec())
}
