//! In-memory store for tests and local development.
//!
//! All state lives behind one `RwLock`. A transaction holds the write lock for its whole life
//! and stages changes on a copy of the state, which replaces the original on commit. Dropping
//! the transaction releases the lock and discards the copy.

use super::{GroupDirectory, PipelineCatalog, WorkerModelFilter, WorkerModelStore, WorkerModelTransaction};
use crate::db::errors::{DbError, Result};
use crate::db::models::{
    groups::{GroupDBResponse, GroupMembership},
    pipelines::PipelineDBResponse,
    projects::ProjectDBResponse,
    worker_models::{WorkerModelCreateDBRequest, WorkerModelDBResponse, WorkerModelUpdateDBRequest},
};
use crate::types::{GroupId, PipelineId, ProjectId, UserId, WorkerModelId};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredPipeline {
    pipeline: PipelineDBResponse,
    worker_model_ids: BTreeSet<WorkerModelId>,
}

#[derive(Debug, Clone, Default)]
struct State {
    worker_models: HashMap<WorkerModelId, WorkerModelDBResponse>,
    groups: HashMap<GroupId, GroupDBResponse>,
    memberships: Vec<GroupMembership>,
    projects: HashMap<ProjectId, ProjectDBResponse>,
    pipelines: HashMap<PipelineId, StoredPipeline>,
}

impl State {
    fn check_unique_name(&self, group_id: GroupId, name: &str, except: Option<WorkerModelId>) -> Result<()> {
        let taken = self
            .worker_models
            .values()
            .any(|m| m.group_id == group_id && m.name == name && Some(m.id) != except);
        if taken {
            return Err(DbError::UniqueViolation {
                constraint: Some("worker_models_group_id_name_key".to_string()),
                table: Some("worker_models".to_string()),
                message: format!("duplicate key value violates unique constraint for ({group_id}, {name})"),
                conflicting_value: Some(name.to_string()),
            });
        }
        Ok(())
    }

    fn check_group_exists(&self, group_id: GroupId) -> Result<()> {
        if !self.groups.contains_key(&group_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("worker_models_group_id_fkey".to_string()),
                table: Some("worker_models".to_string()),
                message: format!("group {group_id} does not exist"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group, returning the existing one if the name is taken
    pub async fn add_group(&self, name: &str) -> GroupDBResponse {
        let mut state = self.state.write().await;
        if let Some(group) = state.groups.values().find(|g| g.name == name) {
            return group.clone();
        }
        let group = GroupDBResponse {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.groups.insert(group.id, group.clone());
        group
    }

    pub async fn add_membership(&self, group_id: GroupId, user_id: UserId, is_group_admin: bool) {
        let mut state = self.state.write().await;
        state.memberships.retain(|m| !(m.group_id == group_id && m.user_id == user_id));
        state.memberships.push(GroupMembership {
            group_id,
            user_id,
            is_group_admin,
        });
    }

    pub async fn add_project(&self, key: &str, name: &str, group_ids: Vec<GroupId>) -> ProjectDBResponse {
        let project = ProjectDBResponse {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: name.to_string(),
            group_ids,
        };
        self.state.write().await.projects.insert(project.id, project.clone());
        project
    }

    /// Add a pipeline requiring the given worker models
    pub async fn add_pipeline(&self, project: &ProjectDBResponse, name: &str, worker_model_ids: &[WorkerModelId]) -> PipelineDBResponse {
        let pipeline = PipelineDBResponse {
            id: Uuid::new_v4(),
            name: name.to_string(),
            project_id: project.id,
            project_key: project.key.clone(),
        };
        self.state.write().await.pipelines.insert(
            pipeline.id,
            StoredPipeline {
                pipeline: pipeline.clone(),
                worker_model_ids: worker_model_ids.iter().copied().collect(),
            },
        );
        pipeline
    }

    /// Overwrite the scheduler-maintained fields of a model
    pub async fn record_spawn_state(&self, id: WorkerModelId, nb_spawn_err: i32, need_registration: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let model = state.worker_models.get_mut(&id).ok_or(DbError::NotFound)?;
        model.nb_spawn_err = nb_spawn_err;
        model.last_spawn_err = (nb_spawn_err > 0).then(|| "worker failed to start".to_string());
        model.need_registration = need_registration;
        Ok(())
    }
}

#[async_trait::async_trait]
impl WorkerModelStore for InMemoryStore {
    async fn get_worker_model(&self, id: WorkerModelId) -> Result<Option<WorkerModelDBResponse>> {
        Ok(self.state.read().await.worker_models.get(&id).cloned())
    }

    async fn find_worker_model(&self, group_id: GroupId, name: &str) -> Result<Option<WorkerModelDBResponse>> {
        let state = self.state.read().await;
        Ok(state
            .worker_models
            .values()
            .find(|m| m.group_id == group_id && m.name == name)
            .cloned())
    }

    async fn list_worker_models(&self, filter: &WorkerModelFilter) -> Result<Vec<WorkerModelDBResponse>> {
        let state = self.state.read().await;
        let mut models: Vec<_> = state.worker_models.values().filter(|m| filter.matches(m)).cloned().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(models)
    }

    async fn begin(&self) -> Result<Box<dyn WorkerModelTransaction>> {
        let guard = self.state.clone().write_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }
}

struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<State>,
    staged: State,
}

#[async_trait::async_trait]
impl WorkerModelTransaction for InMemoryTransaction {
    async fn create_worker_model(&mut self, request: &WorkerModelCreateDBRequest) -> Result<WorkerModelDBResponse> {
        self.staged.check_group_exists(request.group_id)?;
        self.staged.check_unique_name(request.group_id, &request.name, None)?;

        let now = Utc::now();
        let model = WorkerModelDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            group_id: request.group_id,
            spec: request.spec.clone(),
            restricted: request.restricted,
            provision: request.provision,
            pattern_name: request.pattern_name.clone(),
            registered_capabilities: request.registered_capabilities.clone(),
            is_deprecated: request.is_deprecated,
            disabled: request.disabled,
            is_official: request.is_official,
            nb_spawn_err: 0,
            last_spawn_err: None,
            need_registration: false,
            last_registration: None,
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        };
        self.staged.worker_models.insert(model.id, model.clone());
        Ok(model)
    }

    async fn update_worker_model(
        &mut self,
        id: WorkerModelId,
        request: &WorkerModelUpdateDBRequest,
    ) -> Result<WorkerModelDBResponse> {
        self.staged.check_group_exists(request.group_id)?;
        self.staged.check_unique_name(request.group_id, &request.name, Some(id))?;

        let model = self.staged.worker_models.get_mut(&id).ok_or(DbError::NotFound)?;
        model.name = request.name.clone();
        model.description = request.description.clone();
        model.group_id = request.group_id;
        model.spec = request.spec.clone();
        model.restricted = request.restricted;
        model.provision = request.provision;
        model.pattern_name = request.pattern_name.clone();
        model.registered_capabilities = request.registered_capabilities.clone();
        model.is_deprecated = request.is_deprecated;
        model.disabled = request.disabled;
        model.is_official = request.is_official;
        model.updated_at = Utc::now();
        Ok(model.clone())
    }

    async fn delete_worker_model(&mut self, id: WorkerModelId) -> Result<bool> {
        let removed = self.staged.worker_models.remove(&id).is_some();
        if removed {
            for stored in self.staged.pipelines.values_mut() {
                stored.worker_model_ids.remove(&id);
            }
        }
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl GroupDirectory for InMemoryStore {
    async fn get_group(&self, id: GroupId) -> Result<Option<GroupDBResponse>> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn get_group_by_name(&self, name: &str) -> Result<Option<GroupDBResponse>> {
        Ok(self.state.read().await.groups.values().find(|g| g.name == name).cloned())
    }

    async fn memberships(&self, user_id: UserId) -> Result<Vec<GroupMembership>> {
        let state = self.state.read().await;
        Ok(state.memberships.iter().filter(|m| m.user_id == user_id).copied().collect())
    }

    async fn get_project_by_key(&self, key: &str) -> Result<Option<ProjectDBResponse>> {
        Ok(self.state.read().await.projects.values().find(|p| p.key == key).cloned())
    }

    async fn ensure_group(&self, name: &str) -> Result<GroupDBResponse> {
        Ok(self.add_group(name).await)
    }
}

#[async_trait::async_trait]
impl PipelineCatalog for InMemoryStore {
    async fn pipelines_using(
        &self,
        worker_model_id: WorkerModelId,
        group_ids: Option<&[GroupId]>,
    ) -> Result<Vec<PipelineDBResponse>> {
        let state = self.state.read().await;
        let project_visible = |project_id: &ProjectId| match group_ids {
            None => true,
            Some(groups) => state
                .projects
                .get(project_id)
                .is_some_and(|p| p.group_ids.iter().any(|g| groups.contains(g))),
        };

        let mut pipelines: Vec<_> = state
            .pipelines
            .values()
            .filter(|s| s.worker_model_ids.contains(&worker_model_id) && project_visible(&s.pipeline.project_id))
            .map(|s| s.pipeline.clone())
            .collect();
        pipelines.sort_by(|a, b| a.project_key.cmp(&b.project_key).then(a.name.cmp(&b.name)));
        Ok(pipelines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::worker_models::{DockerSpec, WorkerModelSpec};

    fn create_request(group_id: GroupId, name: &str) -> WorkerModelCreateDBRequest {
        WorkerModelCreateDBRequest {
            name: name.to_string(),
            description: None,
            group_id,
            spec: WorkerModelSpec::Docker(DockerSpec {
                image: "debian:12".to_string(),
                cmd: "./worker".to_string(),
                shell: "sh -c".to_string(),
                ..Default::default()
            }),
            restricted: false,
            provision: 0,
            pattern_name: Some("default".to_string()),
            registered_capabilities: vec![],
            is_deprecated: false,
            disabled: false,
            is_official: false,
            created_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = InMemoryStore::new();
        let group = store.add_group("team-a").await;

        let mut tx = store.begin().await.unwrap();
        let created = tx.create_worker_model(&create_request(group.id, "m1")).await.unwrap();
        tx.commit().await.unwrap();

        let found = store.find_worker_model(group.id, "m1").await.unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        let group = store.add_group("team-a").await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_worker_model(&create_request(group.id, "m1")).await.unwrap();
            // dropped without commit
        }
        assert!(store.find_worker_model(group.id, "m1").await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.create_worker_model(&create_request(group.id, "m2")).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.list_worker_models(&WorkerModelFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_in_group_is_rejected() {
        let store = InMemoryStore::new();
        let g1 = store.add_group("team-a").await;
        let g2 = store.add_group("team-b").await;

        let mut tx = store.begin().await.unwrap();
        tx.create_worker_model(&create_request(g1.id, "m1")).await.unwrap();
        let err = tx.create_worker_model(&create_request(g1.id, "m1")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Same name in another group is fine
        tx.create_worker_model(&create_request(g2.id, "m1")).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_requires_existing_group() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.create_worker_model(&create_request(Uuid::new_v4(), "m1")).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_scheduler_fields() {
        let store = InMemoryStore::new();
        let group = store.add_group("team-a").await;

        let mut tx = store.begin().await.unwrap();
        let created = tx.create_worker_model(&create_request(group.id, "m1")).await.unwrap();
        tx.commit().await.unwrap();
        store.record_spawn_state(created.id, 3, true).await.unwrap();

        let request = WorkerModelUpdateDBRequest {
            name: "m1-renamed".to_string(),
            description: Some("renamed".to_string()),
            group_id: group.id,
            spec: created.spec.clone(),
            restricted: false,
            provision: 0,
            pattern_name: created.pattern_name.clone(),
            registered_capabilities: vec!["git".to_string()],
            is_deprecated: false,
            disabled: false,
            is_official: false,
        };
        let mut tx = store.begin().await.unwrap();
        let updated = tx.update_worker_model(created.id, &request).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(updated.name, "m1-renamed");
        assert_eq!(updated.nb_spawn_err, 3);
        assert!(updated.need_registration);

        let mut tx = store.begin().await.unwrap();
        let err = tx.update_worker_model(Uuid::new_v4(), &request).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_pipelines_using_respects_project_groups() {
        let store = InMemoryStore::new();
        let g1 = store.add_group("team-a").await;
        let g2 = store.add_group("team-b").await;

        let mut tx = store.begin().await.unwrap();
        let model = tx.create_worker_model(&create_request(g1.id, "m1")).await.unwrap();
        tx.commit().await.unwrap();

        let p1 = store.add_project("PROJ1", "Project 1", vec![g1.id]).await;
        let p2 = store.add_project("PROJ2", "Project 2", vec![g2.id]).await;
        store.add_pipeline(&p1, "build", &[model.id]).await;
        store.add_pipeline(&p2, "deploy", &[model.id]).await;
        store.add_pipeline(&p2, "lint", &[]).await;

        let all = store.pipelines_using(model.id, None).await.unwrap();
        assert_eq!(all.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["build", "deploy"]);

        let visible = store.pipelines_using(model.id, Some(&[g1.id])).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].project_key, "PROJ1");

        // Deleting the model drops its usage
        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete_worker_model(model.id).await.unwrap());
        tx.commit().await.unwrap();
        assert!(store.pipelines_using(model.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let store = InMemoryStore::new();
        let group = store.ensure_group("shared.infra").await.unwrap();
        assert_eq!(store.ensure_group("shared.infra").await.unwrap().id, group.id);
        assert_eq!(store.get_group_by_name("shared.infra").await.unwrap().unwrap().id, group.id);
        assert!(store.get_group(Uuid::new_v4()).await.unwrap().is_none());

        let user = Uuid::new_v4();
        store.add_membership(group.id, user, false).await;
        store.add_membership(group.id, user, true).await;
        let memberships = store.memberships(user).await.unwrap();
        assert_eq!(memberships.len(), 1);
        assert!(memberships[0].is_group_admin);

        store.add_project("PROJ", "Project", vec![group.id]).await;
        assert!(store.get_project_by_key("PROJ").await.unwrap().is_some());
        assert!(store.get_project_by_key("NOPE").await.unwrap().is_none());
    }
}
