use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{get_check, get_check_definition, health_check, list_checks, stats, AppState};
use crate::alerts::AlertChecker;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Build the status router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Checks
        .route("/checks", get(list_checks))
        .route("/checks/:id", get(get_check))
        .route("/checks/:id/definition", get(get_check_definition))
        // Stats
        .route("/stats", get(stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the status API until `shutdown` resolves
pub async fn run_server(
    config: ServerConfig,
    checker: Arc<AlertChecker>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(Arc::new(AppState { checker }));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting status API on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Status API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::CheckDefinition;
    use crate::dispatch::Dispatcher;
    use crate::search::MemoryIndex;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn create_test_app() -> (Arc<AlertChecker>, Router) {
        let index = Arc::new(MemoryIndex::new());
        index.insert("logs", serde_json::json!({"ts": 1, "level": "INFO"}));

        let checker = Arc::new(AlertChecker::new(index, Arc::new(Dispatcher::start(1))));
        let state = Arc::new(AppState {
            checker: Arc::clone(&checker),
        });
        (checker, build_router(state))
    }

    fn register(checker: &AlertChecker, id: &str) {
        let definition = CheckDefinition::new(id, "logs", "ts")
            .with_schedule("1h")
            .with_clauses(
                "query_string",
                serde_yaml::from_str("{query: 'level:ERROR'}").unwrap(),
            );
        checker.register(definition).unwrap();
    }

    async fn send_get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_checker, app) = create_test_app();

        let response = send_get(app, "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"], 0);
    }

    #[tokio::test]
    async fn test_list_and_get_checks() {
        let (checker, app) = create_test_app();
        register(&checker, "b-errors");
        register(&checker, "a-errors");

        let response = send_get(app.clone(), "/checks").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["checks"][0]["id"], "a-errors");
        assert_eq!(body["checks"][1]["id"], "b-errors");

        let response = send_get(app.clone(), "/checks/a-errors").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["index"], "logs");
        assert_eq!(body["enabled"], true);

        let response = send_get(app, "/checks/a-errors/definition").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["query"]["type"], "query_string");

        checker.shutdown().await;
    }

    #[tokio::test]
    async fn test_check_not_found() {
        let (_checker, app) = create_test_app();

        let response = send_get(app, "/checks/nonexistent").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats() {
        let (_checker, app) = create_test_app();

        let response = send_get(app, "/stats").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["pool_size"], 1);
        assert_eq!(body["stopped"], false);
    }
}
