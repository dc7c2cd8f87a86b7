//! A2A Task Gateway entry point (spec.md §4.1/§4.2): wires the Task
//! Registry, Agent Bridge, and Agent Card cache behind an axum `Router`,
//! then spawns a dispatch loop over the registry's promotion channel so
//! queued tasks execute as soon as they're promoted to `active`.
//!
//! Grounded on the teacher's `main()` (dotenvy + tracing-subscriber
//! bring-up, `CorsLayer`) and
//! `examples/original_source/a2a_server/server.py`'s `create_app`/
//! `handle_health`/`handle_agent_card`.

mod agent_card;
mod registry;
mod rpc;
mod sse;

use std::net::SocketAddr;
use std::sync::Arc;

use a2a_bridge::AgentBridge;
use a2a_core::config::GatewayConfig;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing_subscriber::prelude::*;

use agent_card::AgentCardCache;
use registry::TaskRegistry;

#[derive(Clone)]
pub struct AppState {
    config: Arc<GatewayConfig>,
    bridge: Arc<AgentBridge>,
    registry: Arc<TaskRegistry>,
    agent_card_cache: Arc<AgentCardCache>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        eprintln!("no .env file found, continuing with process environment");
    }
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load()?;
    let host = config.host.clone();
    let port = config.port;

    let bridge = AgentBridge::new(&config.agent_connection, config.reports_dir.clone());
    let (registry, mut promoted_rx) = TaskRegistry::new(config.task_queue.max_concurrent, config.task_queue.max_queued);

    let state = AppState {
        config: Arc::new(config),
        bridge: Arc::new(bridge),
        registry: Arc::new(registry),
        agent_card_cache: Arc::new(AgentCardCache::new()),
    };

    let dispatch_state = state.clone();
    tokio::spawn(async move {
        while let Some(task_id) = promoted_rx.recv().await {
            let state = dispatch_state.clone();
            tokio::spawn(async move { rpc::run_new_task(&state, task_id).await });
        }
    });

    let app = build_app(state);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!(%addr, "A2A Task Gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/.well-known/agent.json", get(agent_card_handler))
        .route("/.well-known/a2a/agent-card", get(agent_card_handler))
        .route("/", post(rpc::handle_jsonrpc))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Derives the externally visible base URL from `X-Forwarded-Proto`/
/// `X-Forwarded-Host` when present (reverse-proxy deployment), else `Host`.
fn base_url_from_headers(headers: &HeaderMap, config: &GatewayConfig) -> String {
    let proto = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()).unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(axum::http::header::HOST))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}:{}", config.host, config.port));
    format!("{proto}://{host}")
}

async fn agent_card_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let base_url = base_url_from_headers(&headers, &state.config);
    let card = state.agent_card_cache.get(&state.config, &base_url);
    let mut response = Json(card).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(axum::http::header::CACHE_CONTROL, "public, max-age=30".parse().unwrap());
    response_headers.insert(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".parse().unwrap());
    response
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok", "activeTasks": state.registry.list_active().len(), "timestamp": chrono::Utc::now()})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::config::{AgentConnectionConfig, AuthenticationConfig, TaskQueueConfig};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            authentication: AuthenticationConfig::default(),
            agent_connection: AgentConnectionConfig::default(),
            task_queue: TaskQueueConfig::default(),
            salute_poll_interval_seconds: 2,
            org_dir: "/nonexistent/organizations".to_string(),
            reports_dir: "/nonexistent/reports".to_string(),
            roles_dir: "/nonexistent/organizations/roles".to_string(),
            plan_library_path: None,
        }
    }

    fn test_state() -> AppState {
        let config = test_config();
        let bridge = AgentBridge::new(&config.agent_connection, config.reports_dir.clone());
        let (registry, _rx) = TaskRegistry::new(config.task_queue.max_concurrent, config.task_queue.max_queued);
        AppState { config: Arc::new(config), bridge: Arc::new(bridge), registry: Arc::new(registry), agent_card_cache: Arc::new(AgentCardCache::new()) }
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = build_app(test_state());
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_card_is_served_with_cache_headers() {
        let app = build_app(test_state());
        let response = app.oneshot(Request::builder().uri("/.well-known/agent.json").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(axum::http::header::CACHE_CONTROL).unwrap(), "public, max-age=30");
    }

    #[tokio::test]
    async fn jsonrpc_rejects_non_2_0_version() {
        let app = build_app(test_state());
        let body = serde_json::json!({"jsonrpc": "1.0", "id": 1, "method": "tasks/get", "params": {}});
        let response = app
            .oneshot(Request::builder().method("POST").uri("/").header("content-type", "application/json").body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
