//! The CRUD shape shared by table-backed repositories.

use crate::db::errors::Result;

/// Data access for one postgres table.
///
/// Requests and responses are the `*DBRequest` / `*DBResponse` types from [`crate::db::models`];
/// `Filter` narrows [`Repository::list`]. Write methods run on whatever connection the repository
/// was built over, so callers decide the transaction boundary.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    type Response;
    type Id: Send + Sync;
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Rows matching the filter, in the repository's natural order
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Returns false when no row had that id
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
