use std::net::SocketAddr;
use std::sync::Arc;

use keygate::auth::{AuthState, TokenVerifier};
use keygate::config::KeygateConfig;
use keygate::jwks::{KeysetHandle, KeysetRefresher, spawn_refresh_task};
use keygate::server::router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match KeygateConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: jwks_url={}, listen_port={}",
        config.jwks_url,
        config.listen_port
    );

    let handle = Arc::new(KeysetHandle::default());
    let refresher = match KeysetRefresher::new(
        config.jwks_url.clone(),
        config.fetch_timeout,
        Arc::clone(&handle),
    ) {
        Ok(refresher) => Arc::new(refresher),
        Err(e) => {
            tracing::error!("Failed to create keyset client: {e}");
            std::process::exit(1);
        }
    };

    // Without an initial keyset every request would be rejected.
    if let Err(e) = refresher.refresh().await {
        tracing::error!("Failed to fetch initial keyset from {}: {e}", config.jwks_url);
        std::process::exit(1);
    }

    let _refresh_task = config
        .refresh_interval
        .and_then(|interval| spawn_refresh_task(&refresher, interval));

    let state = AuthState::new(TokenVerifier::new(config.claim_policy()), handle)
        .with_lazy_refresh(
            Arc::clone(&refresher),
            keygate::auth::middleware::DEFAULT_LAZY_REFRESH_INTERVAL,
        );
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
