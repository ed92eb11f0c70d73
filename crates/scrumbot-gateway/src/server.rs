//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use scrumbot_core::config::ScrumBotConfig;
use scrumbot_core::traits::Notifier;
use scrumbot_scheduler::ScrumDb;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::sessions::SessionStore;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScrumBotConfig>,
    pub db: Arc<ScrumDb>,
    pub notifier: Arc<dyn Notifier>,
    /// Setup submissions waiting for a master selection.
    pub sessions: Arc<SessionStore>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: ScrumBotConfig, db: Arc<ScrumDb>, notifier: Arc<dyn Notifier>) -> Self {
        let ttl = Duration::from_secs(config.sessions.setup_ttl_secs);
        Self {
            config: Arc::new(config),
            db,
            notifier,
            sessions: Arc::new(SessionStore::new(ttl)),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/", post(super::routes::handle_command))
        .route("/req", post(super::routes::handle_interaction))
        .route("/health-check", get(super::routes::health_check))
        // Legacy misspelled probe path.
        .route("/heath-check", get(super::routes::health_check))
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server.
pub async fn start(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use scrumbot_scheduler::testing::RecordingNotifier;
    use tower::ServiceExt;

    fn state(maintenance_file: &str) -> AppState {
        let mut config = ScrumBotConfig::default();
        config.app_token = "secret".into();
        config.health.maintenance_file = maintenance_file.into();
        AppState::new(
            config,
            Arc::new(ScrumDb::in_memory().unwrap()),
            Arc::new(RecordingNotifier::default()),
        )
    }

    #[tokio::test]
    async fn test_health_routes() {
        let app = build_router(state("/nonexistent/scrumbot-maintenance"));
        for path in ["/health-check", "/heath-check"] {
            let resp = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn test_command_rejects_bad_token() {
        let app = build_router(state("/nonexistent/scrumbot-maintenance"));
        let req = Request::post("/")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"appToken":"wrong","text":"help"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_command_help_over_http() {
        let app = build_router(state("/nonexistent/scrumbot-maintenance"));
        let req = Request::post("/")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"appToken":"secret","text":"help","channelId":1}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["text"], "`/scrum` help");
    }
}
