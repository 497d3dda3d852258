use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use chatbox_types::api::{Claims, DeleteMessageRequest, SendMessageRequest};
use chatbox_types::events::GatewayEvent;
use chatbox_types::models::Message;

use crate::auth::{AppState, authorize_privileged};
use crate::blocking;
use crate::error::{ApiError, ApiResult};

/// POST /send-message: author comes from the token, never the body.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    if req.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".into()));
    }

    let author = claims.username.clone();
    let message = blocking(&state, move |db| {
        db.insert_message(&author, &req.message).and_then(Message::try_from)
    })
    .await?;

    info!("{} sent message {}", message.username, message.id);

    // Broadcast to all WebSocket clients, sender included
    state
        .dispatcher
        .broadcast(GatewayEvent::MessageCreated(message.clone()))
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /get-messages: full history, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let messages = blocking(&state, |db| {
        db.list_messages()?
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(messages))
}

/// DELETE /delete-message/{id}: admin only, with password re-check.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<DeleteMessageRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let admin = authorize_privileged(&state, &claims, req.password).await?;

    let deleted = blocking(&state, move |db| {
        db.delete_message(&message_id).and_then(Message::try_from)
    })
    .await?;

    info!("{} deleted message {} by {}", admin.username, deleted.id, deleted.username);

    state
        .dispatcher
        .broadcast(GatewayEvent::MessageDeleted(deleted.clone()))
        .await;

    Ok(Json(deleted))
}
