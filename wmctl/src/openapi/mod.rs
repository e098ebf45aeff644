//! OpenAPI document for the `/api/v1` surface, served at `/api/v1/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::errors::ErrorBody;

/// Registers the two ways a caller can present a session token.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session token in the `Authorization: Bearer <token>` header"))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "wmctl_session",
                    "Session token in the session cookie (name configurable via `auth.session.cookie_name`)",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "wmctl",
        description = "Worker model catalog: templates from which the scheduler spawns build agents."
    ),
    servers(
        (url = "/api/v1", description = "Worker model API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::worker_models::create_worker_model,
        api::handlers::worker_models::list_worker_models,
        api::handlers::worker_models::get_worker_model,
        api::handlers::worker_models::update_worker_model,
        api::handlers::worker_models::delete_worker_model,
        api::handlers::worker_models::list_worker_model_usage,
        api::handlers::worker_models::list_project_worker_models,
        api::handlers::worker_models::list_group_worker_models,
        api::handlers::worker_models::list_worker_model_types,
        api::handlers::worker_models::list_worker_model_communications,
    ),
    components(
        schemas(
            api::models::worker_models::WorkerModelDefinition,
            api::models::worker_models::WorkerModelResponse,
            api::models::worker_models::WorkerModelType,
            api::models::worker_models::WorkerModelCommunication,
            api::models::worker_models::DockerSpec,
            api::models::worker_models::VirtualMachineSpec,
            api::models::worker_models::StateFilter,
            api::models::pipelines::PipelineResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "worker-models", description = "Worker model catalog"),
    )
)]
pub struct ApiDoc;
