use std::sync::Arc;

use anyhow::Context;
use tokio::signal::ctrl_c;
use tracing::info;

use shelfmark_api::app::{build_app, services::build_services};
use shelfmark_api::config::ApiConfig;

#[tokio::main]
async fn main() {
    shelfmark_observability::init();

    if let Err(e) = run().await {
        tracing::error!("server exited with error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        build_services(&config)
            .await
            .context("failed to open document store")?,
    );
    let store = services.store.clone();

    let app = build_app(services, &config.jwt_secret);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    info!("document store closed; bye");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
