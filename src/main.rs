use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use senior_sns::config::{Cli, Config};
use senior_sns::services::Services;
use senior_sns::state::AppState;
use senior_sns::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets may live in a local .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    // External services
    let services = Services::from_config(&config).await?;
    if config.media.transcode {
        tracing::info!("Media transcoding enabled ({})", config.media.ffmpeg_path);
    }

    let state = AppState::new(pool, config.clone(), services);
    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API docs at http://{}/api-docs", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
