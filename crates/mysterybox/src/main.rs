use mysterybox::prelude::*;
use mysterybox::session::SessionError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), MysteryBoxError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        max_attempts = config.session.max_attempts,
        total_boxes = config.reveal.total_boxes,
        win_probability = config.reveal.win_probability,
        "starting mystery box server"
    );

    match &config.store_path {
        Some(path) => {
            let store = FileStore::open(path).await.map_err(SessionError::from)?;
            tracing::info!(path = %path.display(), "sessions persisted to file");
            let server = config.builder().build(store).await?;
            server.run_until(shutdown_signal()).await
        }
        None => {
            tracing::info!("sessions kept in memory");
            let server = config.builder().build(MemoryStore::new()).await?;
            server.run_until(shutdown_signal()).await
        }
    }
}

/// Resolves on Ctrl-C. If the handler can't be installed the server runs
/// until it is killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
