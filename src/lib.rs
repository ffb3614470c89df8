pub mod api;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod host;
pub mod repository;
pub mod scheduler;
pub mod state;
pub mod storage;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use crate::{
    cache::MemoryCache,
    config::Config,
    error::Result,
    host::ServerHost,
    repository::ListVersionRepository,
    state::AppState,
    storage::{PgStorage, Tables, new_db_pool, schema},
};

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("TEASERLIST_LOG"))
        .init();

    let config = Config::from_env()?;
    let db = new_db_pool(&config.database_url).await?;
    let tables = Tables::new(&config.table_prefix);

    if let Some(installed) = config.installed_version {
        schema::upgrade(&db, &tables, installed).await?;
    }
    schema::install(&db, &tables).await?;

    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let repo = Arc::new(ListVersionRepository::new(
        PgStorage::new(db, tables),
        MemoryCache::new(),
        ServerHost::new(jobs_tx),
    ));
    scheduler::spawn(repo.clone(), jobs_rx);

    let router = api::setup_route(AppState::new(repo));
    api::run_server(router, &config.addr).await
}
