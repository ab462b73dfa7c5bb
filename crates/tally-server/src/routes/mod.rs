//! Route definitions.

mod auth;
mod debts;
mod friendships;
mod health;
mod payments;
mod users;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the application router.
///
/// `cors_origins` lists the browser origins allowed to call the API. An
/// empty list adds no CORS layer.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health))
        .nest("/api/auth", auth::routes())
        .nest("/api/users", users::routes())
        .nest("/api/debts", debts::routes())
        .nest("/api/payments", payments::routes())
        .nest("/api/friendships", friendships::routes())
        .with_state(state);

    if let Some(cors) = cors_layer(cors_origins) {
        router = router.layer(cors);
    }

    router.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{send, test_app, test_state};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _) = test_app();
        let (status, _) = send(&app, Method::GET, "/api/nothing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let app = router(test_state(), &["http://localhost:5173".to_string()]);
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:5173")
        );
    }

    #[test]
    fn test_cors_layer_skips_empty_list() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_none());
    }
}
