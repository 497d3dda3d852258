use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the bearer token, then expose its claims to the
/// handler as an `Extension<Claims>`.
///
/// A missing or unparseable header is 401; a token that fails verification
/// (bad signature, expired) is 403. Clients branch on the difference.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthenticated("Unauthorized".into()))?;

    let claims = state.tokens.verify(bearer.token())?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
