use std::sync::Arc;

use mongodb::Client as MongoClient;

use crate::config::Config;
use crate::store::{mongo::MongoStore, AttemptStore, ExamCatalog};

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn ExamCatalog>,
    pub attempts: Arc<dyn AttemptStore>,
}

impl AppState {
    /// Production state backed by MongoDB. Creates the indexes the
    /// attempt invariants rely on before serving traffic.
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let db = mongo_client.database(&config.mongo_database);

        let store = MongoStore::new(db);
        store.ensure_indexes().await?;
        tracing::info!("MongoDB indexes ensured");

        let store = Arc::new(store);
        Ok(Self {
            config,
            catalog: store.clone(),
            attempts: store,
        })
    }

    /// State over explicit store handles; what the integration tests
    /// and local tooling use.
    pub fn with_stores(
        config: Config,
        catalog: Arc<dyn ExamCatalog>,
        attempts: Arc<dyn AttemptStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            attempts,
        }
    }
}

pub mod attempt_service;
pub mod eligibility;
pub mod grading;
pub mod grading_service;
pub mod scoring;
pub mod statistics_service;
