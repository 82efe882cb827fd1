use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskflow_server::config::Config;
use taskflow_server::{routes, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let database_url = config.database_url()?;

    let store = store::connect(&database_url).await?;
    store.ensure_schema().await?;
    tracing::info!("database schema is up to date");

    let app = routes::router(store);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
