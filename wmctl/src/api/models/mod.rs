//! API request and response data models.
//!
//! These types define the public API contract and are kept apart from the database models in
//! [`crate::db::models`], so storage and wire representations can evolve independently. All of
//! them derive `utoipa::ToSchema` for the generated OpenAPI document.
//!
//! - [`users`]: the authenticated caller and platform roles
//! - [`worker_models`]: worker model definitions, responses and list filters
//! - [`pipelines`]: pipelines returned by the usage endpoint

pub mod pipelines;
pub mod users;
pub mod worker_models;
