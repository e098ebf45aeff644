//! PostgreSQL-backed store built on the repositories in [`crate::db::handlers`].

use super::{GroupDirectory, PipelineCatalog, WorkerModelFilter, WorkerModelStore, WorkerModelTransaction};
use crate::db::errors::{DbError, Result};
use crate::db::handlers::{Groups, Pipelines, Projects, Repository, WorkerModels};
use crate::db::models::{
    groups::{GroupDBResponse, GroupMembership},
    pipelines::PipelineDBResponse,
    projects::ProjectDBResponse,
    worker_models::{WorkerModelCreateDBRequest, WorkerModelDBResponse, WorkerModelUpdateDBRequest},
};
use crate::types::{GroupId, UserId, WorkerModelId};
use sqlx::{PgPool, Postgres, Transaction};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl WorkerModelStore for PgStore {
    async fn get_worker_model(&self, id: WorkerModelId) -> Result<Option<WorkerModelDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        WorkerModels::new(&mut conn).get_by_id(id).await
    }

    async fn find_worker_model(&self, group_id: GroupId, name: &str) -> Result<Option<WorkerModelDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        WorkerModels::new(&mut conn).get_by_group_and_name(group_id, name).await
    }

    async fn list_worker_models(&self, filter: &WorkerModelFilter) -> Result<Vec<WorkerModelDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        WorkerModels::new(&mut conn).list(filter).await
    }

    async fn begin(&self) -> Result<Box<dyn WorkerModelTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Wraps a sqlx transaction; sqlx rolls it back when dropped uncommitted.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl WorkerModelTransaction for PgTransaction {
    async fn create_worker_model(&mut self, request: &WorkerModelCreateDBRequest) -> Result<WorkerModelDBResponse> {
        WorkerModels::new(&mut self.tx).create(request).await
    }

    async fn update_worker_model(
        &mut self,
        id: WorkerModelId,
        request: &WorkerModelUpdateDBRequest,
    ) -> Result<WorkerModelDBResponse> {
        WorkerModels::new(&mut self.tx).update(id, request).await
    }

    async fn delete_worker_model(&mut self, id: WorkerModelId) -> Result<bool> {
        WorkerModels::new(&mut self.tx).delete(id).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(DbError::from)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(DbError::from)
    }
}

#[async_trait::async_trait]
impl GroupDirectory for PgStore {
    async fn get_group(&self, id: GroupId) -> Result<Option<GroupDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Groups::new(&mut conn).get_by_id(id).await
    }

    async fn get_group_by_name(&self, name: &str) -> Result<Option<GroupDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Groups::new(&mut conn).get_by_name(name).await
    }

    async fn memberships(&self, user_id: UserId) -> Result<Vec<GroupMembership>> {
        let mut conn = self.pool.acquire().await?;
        Groups::new(&mut conn).memberships_for_user(user_id).await
    }

    async fn get_project_by_key(&self, key: &str) -> Result<Option<ProjectDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Projects::new(&mut conn).get_by_key(key).await
    }

    async fn ensure_group(&self, name: &str) -> Result<GroupDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Groups::new(&mut conn).ensure(name).await
    }
}

#[async_trait::async_trait]
impl PipelineCatalog for PgStore {
    async fn pipelines_using(
        &self,
        worker_model_id: WorkerModelId,
        group_ids: Option<&[GroupId]>,
    ) -> Result<Vec<PipelineDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Pipelines::new(&mut conn).list_using_worker_model(worker_model_id, group_ids).await
    }
}
