use std::sync::Arc;

use crate::{config::Config, graph::GraphStore, security::Security};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GraphStore>,
    pub security: Security,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = GraphStore::connect(&config.database.url, config.cache.capacity).await;
        store.init().await?;

        let security = Security::new(&config.auth);

        Ok(Self {
            store: Arc::new(store),
            security,
            config,
        })
    }
}
