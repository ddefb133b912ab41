use crate::api;
use crate::auth::{
    reset::LogResetNotifier,
    store::{AuthStore, MemoryStore, PgStore},
    AuthEngine,
};
use crate::cli::actions::Action;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server { port, dsn, config } = action;

    let store: Arc<dyn AuthStore> = match dsn {
        Some(dsn) => {
            // Validate the DSN up front so a typo fails before binding.
            let url = Url::parse(&dsn).context("invalid DSN")?;
            info!(
                host = url.host_str().unwrap_or("unknown"),
                "connecting to database"
            );

            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;

            let store = PgStore::new(pool);
            store.migrate().await.context("Failed to apply schema")?;
            Arc::new(store)
        }
        None => {
            warn!("no DSN configured, using the in-memory store; state will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Arc::new(AuthEngine::new(store, config, Arc::new(LogResetNotifier)));

    api::serve(port, engine).await
}
