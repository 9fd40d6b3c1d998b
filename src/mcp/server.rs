use crate::config::Config;
use crate::db::Db;
use crate::error::{GraphmemError, Result};
use crate::graph::store::StorageAdapter;
use crate::graph::KnowledgeGraphManager;
use crate::mcp::tools;
use crate::mcp::types::*;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};

/// MCP Server implementation
pub struct McpServer<S> {
    manager: KnowledgeGraphManager<S>,
    db: Db,
    config: Config,
}

impl<S: StorageAdapter> McpServer<S> {
    /// Create a new MCP server
    pub fn new(store: Arc<S>, db: Db, config: Config) -> Self {
        Self {
            manager: KnowledgeGraphManager::new(store),
            db,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process an MCP JSON-RPC request (transport-agnostic).
    ///
    /// Handles routing of MCP protocol requests; callable from both the
    /// stdio and HTTP transports. Returns `Ok(None)` for notifications.
    pub async fn process_mcp_request(
        &self,
        request: JsonRpcRequest,
        initialized: &mut bool,
    ) -> Result<Option<JsonRpcResponse>> {
        // Notifications carry no ID and get no response.
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                if request.method == "notifications/initialized" {
                    *initialized = true;
                }
                return Ok(None);
            }
        };

        // HTTP transport is stateless, so initialization is tracked but not
        // enforced here; the stdio loop owns the flag.
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&id, &request.params),
            "tools/list" => self.handle_tools_list(&id),
            "tools/call" => self.handle_tools_call(&id, &request.params).await,
            "shutdown" => Ok(JsonRpcResponse::result(&id, serde_json::json!(null))),
            _ => Ok(JsonRpcResponse::error(
                id.clone().into(),
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            )),
        };

        match response {
            Ok(resp) => Ok(Some(resp)),
            Err(e) => Ok(Some(JsonRpcResponse::error(
                id.into(),
                error_codes::INTERNAL_ERROR,
                format!("Internal error: {e}"),
            ))),
        }
    }

    /// Run the MCP server (reads from stdin, writes to stdout)
    pub async fn run(&mut self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdin_reader = AsyncBufReader::new(stdin);
        let mut stdout = tokio::io::stdout();

        let mut line = String::new();
        let mut initialized = false;

        // Per MCP spec, diagnostics go to stderr; stdout carries only
        // JSON-RPC frames.
        log::info!(
            "GraphMem MCP server v{} starting (stdio transport)",
            env!("CARGO_PKG_VERSION")
        );

        loop {
            line.clear();
            let bytes_read = stdin_reader.read_line(&mut line).await?;

            // EOF - client disconnected
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    // Answer the parse error if an ID can still be recovered.
                    if let Some(id) = extract_id(trimmed) {
                        let response = JsonRpcResponse::error(
                            id,
                            error_codes::PARSE_ERROR,
                            format!("Parse error: {e}"),
                        );
                        send_response(&mut stdout, &response).await?;
                    }
                    continue;
                }
            };

            match self.process_mcp_request(request, &mut initialized).await {
                Ok(Some(response)) => send_response(&mut stdout, &response).await?,
                Ok(None) => {
                    if initialized {
                        log::debug!("Client initialized");
                    }
                }
                Err(e) => {
                    // process_mcp_request converts handler errors itself.
                    log::error!("Unexpected error in process_mcp_request: {e}");
                }
            }
        }

        log::info!("MCP server shutting down");
        Ok(())
    }

    /// Handle initialize request
    fn handle_initialize(&self, id: &JsonRpcId, params: &Option<Value>) -> Result<JsonRpcResponse> {
        let params: InitializeParams =
            serde_json::from_value(params.clone().unwrap_or(serde_json::json!({})))
                .map_err(|e| GraphmemError::McpProtocol(format!("Invalid initialize params: {e}")))?;

        // Negotiate down to the stable protocol revision for known clients.
        let protocol_version = if params.protocol_version.starts_with("2024")
            || params.protocol_version.starts_with("2025")
        {
            "2024-11-05".to_string()
        } else {
            params.protocol_version.clone()
        };

        let result = InitializeResult {
            protocol_version,
            capabilities: serde_json::json!({ "tools": {} }),
            server_info: ServerInfo {
                name: "graphmem".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(JsonRpcResponse::result(
            id,
            serde_json::to_value(&result)
                .map_err(|e| GraphmemError::McpProtocol(format!("JSON serialization error: {e}")))?,
        ))
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: &JsonRpcId) -> Result<JsonRpcResponse> {
        let result = ToolsListResult {
            tools: tools::get_tool_definitions(),
        };

        Ok(JsonRpcResponse::result(
            id,
            serde_json::to_value(&result)
                .map_err(|e| GraphmemError::McpProtocol(format!("JSON serialization error: {e}")))?,
        ))
    }

    /// Handle tools/call request
    async fn handle_tools_call(
        &self,
        id: &JsonRpcId,
        params: &Option<Value>,
    ) -> Result<JsonRpcResponse> {
        let params: ToolsCallParams = serde_json::from_value(
            params
                .clone()
                .ok_or_else(|| GraphmemError::McpProtocol("Missing params for tools/call".to_string()))?,
        )
        .map_err(|e| GraphmemError::McpProtocol(format!("Invalid tools/call params: {e}")))?;

        let result = match params.name.as_str() {
            "create_entities" => {
                tools::handle_create_entities(&self.manager, &self.db, &params.arguments).await?
            }
            "create_relations" => {
                tools::handle_create_relations(&self.manager, &self.db, &params.arguments).await?
            }
            "add_observations" => {
                tools::handle_add_observations(&self.manager, &self.db, &params.arguments).await?
            }
            "delete_entities" => {
                tools::handle_delete_entities(&self.manager, &self.db, &params.arguments).await?
            }
            "delete_observations" => {
                tools::handle_delete_observations(&self.manager, &self.db, &params.arguments)
                    .await?
            }
            "delete_relations" => {
                tools::handle_delete_relations(&self.manager, &self.db, &params.arguments).await?
            }
            "read_graph" => tools::handle_read_graph(&self.manager).await?,
            "search_nodes" => tools::handle_search_nodes(&self.manager, &params.arguments).await?,
            "open_nodes" => tools::handle_open_nodes(&self.manager, &params.arguments).await?,
            _ => {
                return Ok(JsonRpcResponse::error(
                    id.clone().into(),
                    error_codes::INVALID_PARAMS,
                    format!("Unknown tool: {}", params.name),
                ));
            }
        };

        Ok(JsonRpcResponse::result(
            id,
            serde_json::to_value(&result)
                .map_err(|e| GraphmemError::McpProtocol(format!("JSON serialization error: {e}")))?,
        ))
    }
}

/// Send JSON-RPC response to stdout (newline-delimited)
async fn send_response(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| GraphmemError::McpProtocol(format!("JSON serialization error: {e}")))?;
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Recover the request ID from a line that failed to parse as a request but
/// is still well-formed JSON (e.g. missing `method`).
fn extract_id(line: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(line).ok()?;
    let id = value.get("id")?;
    match id {
        Value::String(_) | Value::Number(_) => Some(id.clone()),
        _ => None,
    }
}
