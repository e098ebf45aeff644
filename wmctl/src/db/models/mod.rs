//! Database record models.
//!
//! These are the shapes repositories and stores return. They are kept separate from the API
//! models so storage and wire representations can evolve independently; conversions live on
//! the API side (see [`crate::api::models::worker_models::WorkerModelResponse`]).
//!
//! - [`worker_models`]: worker model definitions plus scheduler-maintained state
//! - [`groups`]: groups and user memberships
//! - [`projects`]: projects and their permitted groups
//! - [`pipelines`]: pipelines consuming worker models

pub mod groups;
pub mod pipelines;
pub mod projects;
pub mod worker_models;
