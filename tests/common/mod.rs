#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use rubyan::app_state::AppState;
use rubyan::config::{AuthConfig, CacheConfig, Config, DatabaseConfig, ServerConfig};
use rubyan::graph::GraphStore;
use rubyan::models::User;
use rubyan::security::Security;
use rubyan::services::identity::CreateUserInput;
use rubyan::services::{ContentService, IdentityService, SocialService};
use rubyan::views::ViewAssembler;

pub struct TestApp {
    // Held so the database file outlives the pool.
    _dir: TempDir,
    pub store: Arc<GraphStore>,
    pub security: Security,
    pub identity: IdentityService,
    pub social: SocialService,
    pub content: ContentService,
    pub views: ViewAssembler,
    pub config: Config,
}

pub fn test_config(database_url: String) -> Config {
    Config {
        database: DatabaseConfig { url: database_url },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        cache: CacheConfig { capacity: 64 },
        auth: AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expire_seconds: 3600,
        },
    }
}

pub async fn test_app() -> TestApp {
    let dir = TempDir::new().expect("temp dir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("rubyan-test.db").display()
    );
    let config = test_config(url);

    let store = Arc::new(GraphStore::connect(&config.database.url, config.cache.capacity).await);
    store.init().await.expect("store init");

    let security = Security::new(&config.auth);

    TestApp {
        _dir: dir,
        identity: IdentityService::new(store.clone(), security.clone()),
        social: SocialService::new(store.clone()),
        content: ContentService::new(store.clone()),
        views: ViewAssembler::new(store.clone()),
        store,
        security,
        config,
    }
}

/// Builds an `AppState` suitable for router-level tests, backed by the same
/// temp-file store pattern as `test_app`.
pub async fn test_state() -> (TempDir, AppState) {
    let dir = TempDir::new().expect("temp dir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("rubyan-test.db").display()
    );
    let state = AppState::new(test_config(url)).await.expect("app state");
    (dir, state)
}

pub async fn register_user(identity: &IdentityService, username: &str) -> User {
    identity
        .create_user(CreateUserInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            full_name: format!("{} Example", username),
            bio: String::new(),
            avatar_link: String::new(),
            password: "hunter22".to_string(),
        })
        .await
        .expect("create user")
}
