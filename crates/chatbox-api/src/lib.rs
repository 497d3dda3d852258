pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod token;
pub mod users;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tracing::error;

use chatbox_db::{Database, StoreError};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// All HTTP routes. Everything except register/login sits behind the bearer
/// token check.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/send-message", post(messages::send_message))
        .route("/get-messages", get(messages::get_messages))
        .route("/users", get(users::list_users))
        .route("/promote-to-admin", post(users::promote_to_admin))
        .route("/delete-message/{id}", delete(messages::delete_message))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Run a blocking DB call off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal("background task failed".into())
        })?
        .map_err(ApiError::from)
}
