use std::sync::Arc;

use axum::Router;
use milletchain_core::config::{AppConfig, ConfigError, LoadOptions};
use milletchain_db::repositories::{
    SqlNotificationSink, SqlOrderRepository, SqlPaymentRepository, SqlPriceHistoryRepository,
    SqlQualityCheckRepository,
};
use milletchain_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::api::{self, AppState};
use crate::services::{OrderWorkflow, ScoringService};
use crate::telemetry::TracingAuditSink;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

impl Application {
    pub fn router(&self) -> Router {
        api::router(self.state.clone(), self.db_pool.clone())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let state = build_state(&config, &db_pool);
    Ok(Application { config, db_pool, state })
}

fn build_state(config: &AppConfig, db_pool: &DbPool) -> AppState {
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));
    let workflow = OrderWorkflow::new(
        orders.clone(),
        Arc::new(SqlPaymentRepository::new(db_pool.clone())),
        Arc::new(SqlNotificationSink::new(db_pool.clone())),
        Arc::new(TracingAuditSink),
    );
    let scoring = ScoringService::new(
        &config.scoring,
        Arc::new(SqlPriceHistoryRepository::new(db_pool.clone())),
        orders,
        Arc::new(SqlQualityCheckRepository::new(db_pool.clone())),
    );

    AppState { orders: Arc::new(workflow), scoring: Arc::new(scoring) }
}
