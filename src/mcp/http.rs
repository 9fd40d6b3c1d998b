//! HTTP transport for the MCP server.
//!
//! Stateless JSON-RPC over `POST /mcp`, with a health probe and an MCP
//! discovery document. Requests are authenticated with a bearer key unless
//! authless mode is enabled.

use crate::db::SqliteAdapter;
use crate::error::{GraphmemError, Result};
use crate::mcp::server::McpServer;
use crate::mcp::types::JsonRpcRequest;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP MCP Server wrapper
pub struct HttpMcpServer {
    server: Arc<McpServer<SqliteAdapter>>,
    api_key: String,
    authless: bool,
}

impl HttpMcpServer {
    /// Create a new HTTP MCP server
    pub fn new(server: McpServer<SqliteAdapter>) -> Result<Self> {
        let http_config = server.config().http_server.clone();

        // API key is required unless authless mode is enabled.
        let api_key = if http_config.authless {
            String::new()
        } else {
            std::env::var(&http_config.api_key_env).map_err(|_| {
                GraphmemError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an \
                     environment variable, or enable authless mode.",
                    http_config.api_key_env
                ))
            })?
        };

        Ok(Self {
            server: Arc::new(server),
            api_key,
            authless: http_config.authless,
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.create_router();

        let addr = format!("127.0.0.1:{port}");
        log::info!("Starting HTTP MCP server on http://{addr}");
        log::info!("MCP endpoint: http://{addr}/mcp");

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            GraphmemError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "Failed to bind to {addr}: {e}. Another process may be using this port; \
                     set http_server.port in config.toml to change it."
                ),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            GraphmemError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {e}"),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    fn create_router(&self) -> Router {
        let allowed_origins = self.server.config().http_server.allowed_origins.clone();

        // Explicit origin list when configured; Any for local dev.
        let cors = if allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/mcp", post(handle_post))
            .route("/health", get(handle_health))
            .route("/.well-known/mcp-server", get(handle_discovery))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(AppState {
                server: Arc::clone(&self.server),
                api_key: self.api_key.clone(),
                authless: self.authless,
            })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    server: Arc<McpServer<SqliteAdapter>>,
    api_key: String,
    authless: bool,
}

/// Handle POST /mcp (JSON-RPC requests)
async fn handle_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if !state.authless {
        if let Err(response) = validate_auth(&headers, &state.api_key) {
            return response;
        }
    }

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("Invalid JSON: {e}")})),
            )
                .into_response();
        }
    };

    // HTTP requests are independent; initialization state is not enforced.
    let mut initialized = false;

    match state.server.process_mcp_request(request, &mut initialized).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            log::error!("Error processing MCP request: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Internal server error",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "graphmem",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_discovery() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "graphmem",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Knowledge graph memory MCP server",
        "endpoint": "/mcp",
        "protocol": "mcp",
        "protocolVersion": "2024-11-05",
    }))
}

/// Check the bearer key; on failure, the 401 response to return.
fn validate_auth(headers: &HeaderMap, api_key: &str) -> std::result::Result<(), Response> {
    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == api_key => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid or missing API key"})),
        )
            .into_response()),
    }
}
