//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! Every route lives under `/api/v1` and requires an authenticated caller:
//!
//! - **Worker models** (`/worker-models/*`): catalog CRUD, usage, type and communication lists
//! - **Projects** (`/projects/{key}/worker-models`): models usable by a project
//! - **Groups** (`/groups/{id}/worker-models`): models usable by a group
//!
//! # OpenAPI Documentation
//!
//! Handlers carry `utoipa` annotations; the document is served at `/api/v1/openapi.json`.

pub mod handlers;
pub mod models;
