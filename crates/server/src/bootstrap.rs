use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use palaver_core::classify::IntentClassifier;
use palaver_core::config::{AppConfig, ConfigError, LoadOptions};
use palaver_core::engine::{DecisionEngine, EngineSettings};
use palaver_core::{
    EscalationLexicon, EscalationPolicy, InMemoryContextStore, InMemoryResponseCache,
    NoopCrmConnector, Normalizer,
};
use palaver_db::{connect, migrations, DbPool, SqliteChatHistoryRepository};

use crate::crm::HttpCrmConnector;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<DecisionEngine>,
    pub history: Arc<SqliteChatHistoryRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("crm client initialization failed: {0}")]
    Crm(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let keyword_table = config.load_keyword_table()?;
    let classifier = IntentClassifier::new(
        config.classifier.clone(),
        keyword_table,
        EscalationLexicon::default(),
    );
    let policy = EscalationPolicy::new(config.escalation.clone());
    let normalizer = Normalizer::new(config.normalizer.clone());
    let cache = Arc::new(InMemoryResponseCache::new(config.engine.cache_capacity));
    let contexts = Arc::new(InMemoryContextStore::new(Duration::from_secs(
        config.engine.context_idle_ttl_secs,
    )));
    let history = Arc::new(SqliteChatHistoryRepository::new(db_pool.clone()));

    let mut engine = DecisionEngine::new(
        normalizer,
        classifier,
        policy,
        cache,
        contexts,
        EngineSettings::from(&config.engine),
    )
    .with_history(history.clone());

    if config.crm.enabled {
        let connector =
            HttpCrmConnector::from_config(&config.crm).map_err(BootstrapError::Crm)?;
        engine = engine.with_crm(Arc::new(connector));
        info!(event_name = "system.bootstrap.crm_enabled", "http crm connector configured");
    } else {
        engine = engine.with_crm(Arc::new(NoopCrmConnector));
    }

    info!(event_name = "system.bootstrap.complete", "application bootstrap complete");
    Ok(Application { config, db_pool, engine: Arc::new(engine), history })
}
