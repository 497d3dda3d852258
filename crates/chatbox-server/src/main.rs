use tracing::info;

use chatbox_server::config::ServerConfig;
use chatbox_server::{build_app, build_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chatbox_server=debug,chatbox_api=debug,chatbox_gateway=debug,chatbox_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = build_state(&config)?;
    let app = build_app(state, &config.static_dir);

    let addr = config.addr()?;
    info!("Chatbox server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
