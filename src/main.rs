use chrono::Duration as ChronoDuration;
use pastebin::{
    cleanup,
    config::Config,
    constants::PASTE_TTL_HOURS,
    database::Database,
    handlers::AppState,
    ratelimit::{Admission, RatePolicy},
    routes,
    services::PasteService,
    store::{MemoryStore, PasteStore},
    tcp::StreamServer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PasteStore>> {
    if config.database_url == "memory" {
        tracing::warn!("Using in-process store; pastes will not survive a restart");
        return Ok(Arc::new(MemoryStore::new(ChronoDuration::hours(PASTE_TTL_HOURS))));
    }

    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;
    Ok(Arc::new(db))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down gracefully...");
}

/// Resolves once the shutdown flag is raised (or its sender is gone).
async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow();
        if stop || rx.changed().await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pastebin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let store = open_store(&config).await?;
    let service = Arc::new(PasteService::new(
        store.clone(),
        config.deny_list.clone(),
        &config.base_url,
    ));

    let tcp_admission = Admission::for_policy(config.rate_limit_enabled, RatePolicy::TCP_CREATE);
    let stream_server = Arc::new(StreamServer::new(
        service.clone(),
        tcp_admission.clone(),
        &config,
    ));

    let http_addr: SocketAddr = format!("{}:{}", config.bind_host, config.http_port).parse()?;
    let tcp_addr: SocketAddr = format!("{}:{}", config.bind_host, config.tcp_port).parse()?;
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting is disabled");
    }

    let state = AppState::new(service, config);

    // Start background cleanup task
    let admissions = vec![
        tcp_admission,
        state.create_admission.clone(),
        state.read_admission.clone(),
    ];
    tokio::spawn(cleanup::start_cleanup_task(store, admissions));

    let app = routes::router(state);

    let tcp_listener = TcpListener::bind(tcp_addr).await?;
    let http_listener = TcpListener::bind(http_addr).await?;
    tracing::info!("📋 pastebin listening on {} (http) and {} (tcp)", http_addr, tcp_addr);
    tracing::info!("📖 OpenAPI document at http://{}/api-docs/openapi.json", http_addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let http = axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let tcp = stream_server.serve(tcp_listener, shutdown_requested(shutdown_rx));

    // Both return once the signal fires and their in-flight work is done.
    let (http_result, ()) = tokio::join!(async move { http.await }, tcp);
    http_result?;

    tracing::info!("Shutdown complete");
    Ok(())
}
