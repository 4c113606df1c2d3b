use rootcause::prelude::Report;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transit_bot::{Bot, BotConfig, NominatimGeocoder, PgLocationStore, StartupError, routes};
use transit_bot_access::{RateLimiter, SessionGuard};
use transit_bot_transit::ResilientFetcher;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!(error = ?report, "transit bot stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Report<StartupError>> {
    // Load configuration from environment
    let config = BotConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!(?config, "Loaded configuration");
    let rotation_threshold = config
        .limits
        .rotation_threshold()
        .map_err(|e| StartupError::Config {
            details: e.to_string(),
        })?;

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| StartupError::Database {
            details: e.to_string(),
        })?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| StartupError::Migration {
            details: e.to_string(),
        })?;

    // Admission and the transit client share one set of rate windows.
    let limiter = RateLimiter::new(config.limits.rate_limit_config());
    let guard = SessionGuard::new(limiter.clone(), rotation_threshold);
    let fetcher = ResilientFetcher::new(config.transit.fetcher_config(), limiter).map_err(|e| {
        StartupError::HttpClient {
            details: e.to_string(),
        }
    })?;
    let geocoder =
        NominatimGeocoder::new(&config.geocoder).map_err(|e| StartupError::HttpClient {
            details: e.to_string(),
        })?;

    let bot = Arc::new(Bot::new(
        guard,
        fetcher,
        Arc::new(geocoder),
        Arc::new(PgLocationStore::new(db_pool)),
    ));
    let app = routes::router(bot);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr: config.listen_addr.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
