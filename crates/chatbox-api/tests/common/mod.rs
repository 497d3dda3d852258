#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use chatbox_api::auth::{AppState, AppStateInner};
use chatbox_api::router;
use chatbox_api::token::TokenService;
use chatbox_db::Database;
use chatbox_gateway::dispatcher::Dispatcher;

pub const TEST_SECRET: &str = "test-secret";

/// Router over a private in-memory database, plus direct access to the
/// state so tests can seed admins and subscribe to broadcasts.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn test_app() -> TestApp {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        tokens: TokenService::new(TEST_SECRET),
        dispatcher: Dispatcher::new(),
    });

    TestApp {
        router: router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn register(&self, username: &str, password: &str) -> StatusCode {
        let body = json!({ "username": username, "password": password });
        self.request(Method::POST, "/register", None, Some(body)).await.0
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        let body = json!({ "username": username, "password": password });
        self.request(Method::POST, "/login", None, Some(body)).await
    }

    /// Register and log in, returning the bearer token.
    pub async fn signup(&self, username: &str, password: &str) -> String {
        assert_eq!(self.register(username, password).await, StatusCode::CREATED);
        let (status, body) = self.login(username, password).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Seed an admin directly in the store, the way an operator would.
    pub fn make_admin(&self, username: &str) {
        self.state.db.set_admin(username).unwrap();
    }

    pub async fn send(&self, token: &str, text: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/send-message",
            Some(token),
            Some(json!({ "message": text })),
        )
        .await
    }

    pub async fn messages(&self, token: &str) -> Vec<Value> {
        let (status, body) = self.request(Method::GET, "/get-messages", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        body.as_array().unwrap().clone()
    }

    pub async fn delete(&self, token: &str, id: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::DELETE,
            &format!("/delete-message/{}", id),
            Some(token),
            Some(json!({ "username": "ignored", "password": password })),
        )
        .await
    }

    pub async fn promote(&self, token: &str, target: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/promote-to-admin",
            Some(token),
            Some(json!({ "username": target, "password": password })),
        )
        .await
    }
}
