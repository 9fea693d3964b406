//! Applies the database migrations to `DATABASE_URL`.

use std::process::ExitCode;

use reconciler::{Config, telemetry};
use record_store::PostgresRecordStore;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    if let Err(e) = telemetry::init(&config) {
        eprintln!("failed to install tracing subscriber: {e}");
        return ExitCode::FAILURE;
    }

    let Some(url) = config.database_url.as_deref() else {
        tracing::error!("DATABASE_URL is not set");
        return ExitCode::FAILURE;
    };

    let store = match PostgresRecordStore::connect(url, config.database_max_connections).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    match store.run_migrations().await {
        Ok(()) => {
            tracing::info!("migrations applied");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "migration failed");
            ExitCode::FAILURE
        }
    }
}
