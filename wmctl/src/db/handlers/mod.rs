//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (a pooled connection or an open
//! transaction) and returns models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`WorkerModels`]: Worker model definitions and list filtering
//! - [`Groups`]: Group lookup and user memberships (read-mostly, no [`Repository`] impl)
//! - [`Projects`]: Projects and the groups holding permissions on them (read-only)
//! - [`Pipelines`]: Pipelines requiring a worker model (read-only)
//!
//! # Common Pattern
//!
//! ```ignore
//! use wmctl::db::handlers::{WorkerModels, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = WorkerModels::new(&mut tx);
//!
//!     let models = repo.list(&Default::default()).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! Application code goes through [`crate::db::store`] rather than using these directly.

pub mod groups;
pub mod pipelines;
pub mod projects;
pub mod repository;
pub mod worker_models;

pub use groups::Groups;
pub use pipelines::Pipelines;
pub use projects::Projects;
pub use repository::Repository;
pub use worker_models::WorkerModels;
