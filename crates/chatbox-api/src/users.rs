use axum::{Extension, Json, extract::State, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::info;

use chatbox_types::api::{Claims, PromoteRequest};

use crate::auth::{AppState, authorize_privileged};
use crate::blocking;
use crate::error::{ApiError, ApiResult};

/// GET /users: any signed-in user may list accounts and their roles.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let users = blocking(&state, |db| db.list_users()).await?;
    Ok(Json(users))
}

/// POST /promote-to-admin
pub async fn promote_to_admin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<PromoteRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let admin = authorize_privileged(&state, &claims, req.password).await?;

    let target = req.username;
    let promoted = blocking(&state, move |db| db.set_admin(&target)).await?;

    info!("{} promoted {} to admin", admin.username, promoted.username);
    Ok(Json(promoted.to_user()))
}
