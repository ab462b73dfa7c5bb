//! # tally-server
//!
//! HTTP API for Tally. Handlers authenticate the caller, validate the
//! request body, run one `tally-core` operation against the shared SQLite
//! connection and map the outcome to a status code.
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`state`]: shared application state
//! - [`error`]: domain error to HTTP response mapping
//! - [`auth`]: bearer-token extractor
//! - [`blocking`]: password hashing off the async executor
//! - [`cached`]: read-through caching and invalidation
//! - [`dto`]: request and response bodies
//! - [`routes`]: the router

pub mod auth;
pub mod blocking;
pub mod cached;
pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use routes::router;
pub use state::AppState;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tally_cache::{Cache, MemoryCache};
    use tally_core::{Identity, IdentitySettings};
    use tally_crypto::jwt::TokenSigner;
    use tally_crypto::password::HashParams;
    use tower::util::ServiceExt;

    use crate::{router, AppState};

    pub const PASSWORD: &str = "correct horse";

    pub fn test_state() -> AppState {
        test_state_with_cache(Arc::new(MemoryCache::new()))
    }

    pub fn test_state_with_cache(cache: Arc<dyn Cache>) -> AppState {
        let conn = tally_db::open_memory().expect("open test db");
        let signer =
            TokenSigner::new(&[7u8; 32], "tally", "tally-clients", 3600).expect("signer");
        let identity = Identity::new(
            signer,
            IdentitySettings {
                hash_params: HashParams::minimal(),
                ..IdentitySettings::default()
            },
        );
        AppState::new(
            conn,
            identity,
            cache,
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
    }

    pub fn test_app() -> (Router, AppState) {
        let state = test_state();
        (router(state.clone(), &[]), state)
    }

    /// Send one request and decode the JSON body, `Value::Null` when empty.
    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    /// Register `first_name` and return `(user id, access token, refresh token)`.
    pub async fn register(app: &Router, first_name: &str) -> (String, String, String) {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": format!("{}@example.com", first_name.to_lowercase()),
                "password": PASSWORD,
                "firstName": first_name,
                "lastName": "Test",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["user"]["userId"].as_str().expect("user id").to_string(),
            body["accessToken"].as_str().expect("access").to_string(),
            body["refreshToken"].as_str().expect("refresh").to_string(),
        )
    }
}
