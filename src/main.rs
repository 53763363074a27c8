use {
    pix_sync::{
        AppState,
        adapters::{gateway_client::GatewayClient, http},
        config::Config,
        domain::{hooks::HookRegistry, store::TransactionStore},
        infra::{memory::InMemoryTransactionStore, postgres::transaction_repo::PgTransactionStore},
        services::sweeper::PendingSweeper,
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn TransactionStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(3))
                .connect(url)
                .await
                .expect("failed to connect to database");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("failed to run migrations");
            Arc::new(PgTransactionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, transactions are kept in memory only");
            Arc::new(InMemoryTransactionStore::new())
        }
    };

    let gateway = match GatewayClient::new(&config.gateway) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            tracing::error!("invalid gateway configuration: {e}");
            std::process::exit(1);
        }
    };

    if config.webhook.signing_secret.is_none() {
        tracing::warn!("WEBHOOK_SIGNING_SECRET not set, webhook callbacks are not authenticated");
    }

    let state = AppState::new(&config, store.clone(), gateway.clone(), HookRegistry::logging());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = PendingSweeper::new(store, gateway, state.reconciler.clone(), config.sweeper.clone());
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    // Outlives the gateway timeout so a slow gateway surfaces as a 502, not a 408.
    let request_timeout = config.gateway.timeout + Duration::from_secs(15);
    let app = http::with_service_layers(http::router(state), request_timeout);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!("listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        tracing::error!("sweeper task panicked: {e}");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
