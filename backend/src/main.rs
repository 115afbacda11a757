use anyhow::Context;
use secret_gift_backend::{app, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("secret_gift_backend=info,tower_http=info")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    let state = AppState::from_config(&config)
        .await
        .context("failed to open data directory")?;

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, persisted = config.data_dir.is_some(), "server listening");

    axum::serve(listener, app(state))
        .await
        .context("server error")?;
    Ok(())
}
