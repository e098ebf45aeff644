//! Storage backends for the worker model catalog.
//!
//! Handlers never talk to a database directly. They go through three narrow traits:
//!
//! - [`WorkerModelStore`]: reads, plus [`WorkerModelStore::begin`] for mutations
//! - [`GroupDirectory`]: groups, memberships and projects
//! - [`PipelineCatalog`]: pipelines requiring a worker model
//!
//! [`Store`] bundles the three so application state can hold a single `Arc<dyn Store>`.
//!
//! Two implementations exist: [`PgStore`] over PostgreSQL via the repositories in
//! [`crate::db::handlers`], and [`InMemoryStore`] for tests and local runs.
//!
//! # Transactions
//!
//! Every mutation happens inside a [`WorkerModelTransaction`]. Nothing is visible to readers
//! until [`WorkerModelTransaction::commit`] returns; dropping the transaction (on an error
//! path, or because the request future was cancelled) discards everything it staged.

use crate::db::errors::Result;
use crate::db::models::{
    groups::{GroupDBResponse, GroupMembership},
    pipelines::PipelineDBResponse,
    projects::ProjectDBResponse,
    worker_models::{WorkerModelCreateDBRequest, WorkerModelDBResponse, WorkerModelUpdateDBRequest},
};
use crate::types::{GroupId, UserId, WorkerModelId};

pub mod in_memory;
pub mod postgres;

pub use crate::db::handlers::worker_models::WorkerModelFilter;
pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait::async_trait]
pub trait WorkerModelStore: Send + Sync {
    async fn get_worker_model(&self, id: WorkerModelId) -> Result<Option<WorkerModelDBResponse>>;

    /// Look a model up by its owning group and name
    async fn find_worker_model(&self, group_id: GroupId, name: &str) -> Result<Option<WorkerModelDBResponse>>;

    /// List models matching `filter`, ordered by name
    async fn list_worker_models(&self, filter: &WorkerModelFilter) -> Result<Vec<WorkerModelDBResponse>>;

    /// Start a transaction for mutations
    async fn begin(&self) -> Result<Box<dyn WorkerModelTransaction>>;
}

/// A unit of work over worker models. Dropping it without committing rolls it back.
#[async_trait::async_trait]
pub trait WorkerModelTransaction: Send {
    /// Insert a model. Fails with a unique violation if the group already has a model of that name.
    async fn create_worker_model(&mut self, request: &WorkerModelCreateDBRequest) -> Result<WorkerModelDBResponse>;

    /// Replace a model's definition. Fails with `NotFound` if it does not exist.
    async fn update_worker_model(
        &mut self,
        id: WorkerModelId,
        request: &WorkerModelUpdateDBRequest,
    ) -> Result<WorkerModelDBResponse>;

    /// Returns whether a model was deleted
    async fn delete_worker_model(&mut self, id: WorkerModelId) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait::async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn get_group(&self, id: GroupId) -> Result<Option<GroupDBResponse>>;

    async fn get_group_by_name(&self, name: &str) -> Result<Option<GroupDBResponse>>;

    async fn memberships(&self, user_id: UserId) -> Result<Vec<GroupMembership>>;

    async fn get_project_by_key(&self, key: &str) -> Result<Option<ProjectDBResponse>>;

    /// Return the group called `name`, creating it first if needed
    async fn ensure_group(&self, name: &str) -> Result<GroupDBResponse>;
}

#[async_trait::async_trait]
pub trait PipelineCatalog: Send + Sync {
    /// Pipelines requiring `worker_model_id`. With `group_ids`, only pipelines of projects on
    /// which one of those groups holds a permission.
    async fn pipelines_using(
        &self,
        worker_model_id: WorkerModelId,
        group_ids: Option<&[GroupId]>,
    ) -> Result<Vec<PipelineDBResponse>>;
}

pub trait Store: WorkerModelStore + GroupDirectory + PipelineCatalog {}

impl<T> Store for T where T: WorkerModelStore + GroupDirectory + PipelineCatalog {}
