//! Fixtures shared by the crate's tests: an in-memory application, callers and signed tokens.

use crate::{
    AppState, Application,
    api::models::users::{CurrentUser, Role},
    auth::session::create_session_token,
    config::{Config, DatabaseConfig},
    db::{
        models::groups::GroupDBResponse,
        store::{GroupDirectory, InMemoryStore},
    },
    types::GroupId,
};
use axum_test::TestServer;
use std::sync::Arc;
use uuid::Uuid;

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::InMemory,
        secret_key: Some("test-secret-key-for-wmctl".to_string()),
        enable_metrics: false,
        ..Default::default()
    }
}

/// Application state over a fresh in-memory store, with the shared infrastructure group created
pub async fn create_test_state() -> (AppState, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let state = crate::build_state(create_test_config(), store.clone())
        .await
        .expect("Failed to build test state");
    (state, store)
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

impl TestApp {
    /// `Authorization` header value authenticating `user`
    pub fn bearer(&self, user: &CurrentUser) -> String {
        format!("Bearer {}", token_for(&self.state.config, user))
    }

    pub async fn shared_infra_group(&self) -> GroupDBResponse {
        self.store
            .get_group(self.state.shared_infra_group)
            .await
            .expect("Failed to load shared group")
            .expect("Shared group missing")
    }
}

pub async fn create_test_app() -> TestApp {
    let (state, store) = create_test_state().await;
    let app = Application::from_state(state.clone()).expect("Failed to create application");
    TestApp {
        server: app.into_test_server(),
        store,
        state,
    }
}

pub fn token_for(config: &Config, user: &CurrentUser) -> String {
    create_session_token(user, config).expect("Failed to sign test token")
}

/// Create a caller with the given role, registering its memberships in the store
pub async fn create_test_user(store: &InMemoryStore, role: Role, groups: &[(GroupId, bool)]) -> CurrentUser {
    let id = Uuid::new_v4();
    for &(group_id, is_group_admin) in groups {
        store.add_membership(group_id, id, is_group_admin).await;
    }
    CurrentUser {
        id,
        username: format!("test_{}_{}", format!("{role:?}").to_lowercase(), id.simple()),
        role,
        memberships: store.memberships(id).await.expect("Failed to load memberships"),
    }
}

/// A valid, non-restricted docker definition any group member may submit
pub fn docker_definition(name: &str, group_id: GroupId) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "type": "docker",
        "group_id": group_id.to_string(),
        "restricted": false,
        "pattern_name": "default",
        "docker": {
            "image": "debian:12",
            "cmd": "./worker",
            "shell": "sh -c"
        }
    })
}
