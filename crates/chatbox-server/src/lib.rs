pub mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chatbox_api::auth::{AppState, AppStateInner};
use chatbox_api::token::TokenService;
use chatbox_db::{Database, StoreError};
use chatbox_gateway::connection;
use chatbox_gateway::dispatcher::Dispatcher;

use crate::config::ServerConfig;

/// Open storage and wire up the shared state.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let db = Database::open(&config.db_path)?;

    if let Some(admin) = &config.bootstrap_admin {
        match db.set_admin(admin) {
            Ok(_) => info!("Bootstrap admin: {}", admin),
            Err(StoreError::UserNotFound(_)) => {
                warn!("Bootstrap admin {} is not registered yet; skipping", admin)
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(&config.jwt_secret),
        dispatcher: Dispatcher::new(),
    }))
}

/// HTTP API, the realtime socket at `/gateway`, and static assets for
/// everything else.
pub fn build_app(state: AppState, static_dir: &Path) -> Router {
    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.dispatcher.clone());

    let assets = ServeDir::new(static_dir)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .merge(chatbox_api::router(state))
        .merge(ws_route)
        .fallback_service(assets)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(dispatcher): State<Dispatcher>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher))
}
