use std::sync::{Arc, LazyLock};

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use rand_core::OsRng;
use tracing::{error, info, warn};

use chatbox_db::Database;
use chatbox_db::models::UserRow;
use chatbox_gateway::dispatcher::Dispatcher;
use chatbox_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest};

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::token::TokenService;

/// Same message for unknown user and wrong password.
const INVALID_CREDENTIALS: &str = "Invalid username or password";

const MAX_USERNAME_LEN: usize = 32;

/// Verifier checked when the named user does not exist, so a miss costs the
/// same Argon2 run as a wrong password.
static DUMMY_VERIFIER: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"chatbox-no-such-user", &salt)
        .map(|hash| hash.to_string())
        .ok()
});

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub dispatcher: Dispatcher,
}

/// POST /register: always creates a non-admin account.
///
/// A taken username answers 409 Conflict rather than a generic 500, so
/// clients can tell it apart from a storage failure.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let username_len = req.username.chars().count();
    if username_len == 0 || username_len > MAX_USERNAME_LEN || req.username.trim() != req.username {
        return Err(ApiError::Validation(format!(
            "username must be 1-{} characters without surrounding whitespace",
            MAX_USERNAME_LEN
        )));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }

    let password_hash = hash_password(req.password).await?;

    let username = req.username;
    let user = blocking(&state, move |db| db.create_user(&username, &password_hash))
        .await
        .map_err(|e| match e {
            ApiError::Storage(chatbox_db::StoreError::DuplicateUsername) => {
                ApiError::Conflict("Username already taken".into())
            }
            other => other,
        })?;

    info!("Registered user {}", user.username);
    Ok((StatusCode::CREATED, Json(user.to_user())))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.clone();
    let user = blocking(&state, move |db| db.get_user_by_username(&username)).await?;

    let matched = verify_user_password(user.as_ref(), req.password).await?;
    let user = match user {
        Some(user) if matched => user,
        _ => return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.into())),
    };

    let token = state.tokens.issue(&user.username, user.is_admin)?;

    Ok(Json(LoginResponse {
        token,
        username: user.username,
        is_admin: user.is_admin,
    }))
}

/// Gate for promotion and deletion.
///
/// Unlike the token check, this looks the caller up fresh, re-verifies their
/// password, and requires the stored admin flag. The `isAdmin` claim in the
/// token is ignored here.
pub async fn authorize_privileged(
    state: &AppState,
    claims: &Claims,
    password: String,
) -> ApiResult<UserRow> {
    let username = claims.username.clone();
    let caller = blocking(state, move |db| db.get_user_by_username(&username)).await?;

    let matched = verify_user_password(caller.as_ref(), password).await?;
    let caller = match caller {
        Some(caller) if matched => caller,
        Some(caller) => {
            warn!("Password re-check failed for {}", caller.username);
            return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }
        None => {
            warn!("Privileged request from unknown user {}", claims.username);
            return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }
    };

    if !caller.is_admin {
        warn!("{} attempted an admin action", caller.username);
        return Err(ApiError::Forbidden("Unauthorized".into()));
    }

    Ok(caller)
}

/// Derive an Argon2id verifier with a fresh random salt.
async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal("background task failed".into())
    })?
    .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// Check `password` against `user`'s verifier. A missing user still runs one
/// verification against [`DUMMY_VERIFIER`] and always reports no match.
async fn verify_user_password(user: Option<&UserRow>, password: String) -> ApiResult<bool> {
    match user {
        Some(user) => check_password(password, user.password.clone()).await,
        None => {
            tokio::task::spawn_blocking(move || {
                if let Some(dummy) = DUMMY_VERIFIER.as_deref() {
                    if let Ok(parsed) = PasswordHash::new(dummy) {
                        let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
                    }
                }
            })
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal("background task failed".into())
            })?;
            Ok(false)
        }
    }
}

async fn check_password(password: String, verifier: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&verifier)?;
        Ok::<_, argon2::password_hash::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal("background task failed".into())
    })?
    .map_err(|e| ApiError::Internal(format!("stored verifier unreadable: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verifier_accepts_only_the_original_password() {
        let verifier = hash_password("hunter2".into()).await.unwrap();
        assert!(!verifier.contains("hunter2"));

        assert!(check_password("hunter2".into(), verifier.clone()).await.unwrap());
        assert!(!check_password("hunter3".into(), verifier).await.unwrap());
    }

    #[test]
    fn dummy_verifier_is_a_real_argon2_hash() {
        let dummy = DUMMY_VERIFIER.as_deref().unwrap();
        let parsed = PasswordHash::new(dummy).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
    }

    #[tokio::test]
    async fn missing_user_never_matches() {
        assert!(!verify_user_password(None, "chatbox-no-such-user".into()).await.unwrap());
        assert!(!verify_user_password(None, "anything".into()).await.unwrap());
    }

    #[tokio::test]
    async fn missing_user_costs_about_as_much_as_a_wrong_password() {
        let real = UserRow {
            username: "alice".into(),
            password: hash_password("pw".into()).await.unwrap(),
            is_admin: false,
            created_at: String::new(),
        };
        // Warm the dummy so its one-off hash is not measured.
        verify_user_password(None, "warm".into()).await.unwrap();

        let start = std::time::Instant::now();
        verify_user_password(Some(&real), "wrong".into()).await.unwrap();
        let wrong_password = start.elapsed();

        let start = std::time::Instant::now();
        verify_user_password(None, "wrong".into()).await.unwrap();
        let missing_user = start.elapsed();

        assert!(
            missing_user * 4 >= wrong_password,
            "missing user took {:?}, wrong password {:?}",
            missing_user,
            wrong_password
        );
    }

    #[tokio::test]
    async fn same_password_gets_distinct_salts() {
        let a = hash_password("pw".into()).await.unwrap();
        let b = hash_password("pw".into()).await.unwrap();
        assert_ne!(a, b);
    }
}
