use std::time::Duration;

use postforce_core::error::{ToolError, codes};
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncWrite, BufReader};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

mod credentials;
mod framing;
mod postman;
mod salesforce;
mod tools;
mod util;

pub use credentials::CredentialStore;
pub use framing::Framing;
pub use tools::{Tool, ToolDefinition, tool_definitions};

use framing::{read_message, write_message};
use tools::parse_args;
use util::{client, to_pretty_json};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "postforce-mcp";

pub const DEFAULT_SALESFORCE_LOGIN_URL: &str = "https://login.salesforce.com";
pub const DEFAULT_SALESFORCE_API_VERSION: &str = "v59.0";
pub const DEFAULT_POSTMAN_API_URL: &str = "https://api.getpostman.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Token endpoint host used when `authenticate_salesforce` omits `login_url`
    pub salesforce_login_url: String,
    /// REST API version segment, e.g. `v59.0`
    pub salesforce_api_version: String,
    pub postman_api_url: String,
    /// Applied to every outbound HTTP call
    pub request_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            salesforce_login_url: DEFAULT_SALESFORCE_LOGIN_URL.to_string(),
            salesforce_api_version: DEFAULT_SALESFORCE_API_VERSION.to_string(),
            postman_api_url: DEFAULT_POSTMAN_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("failed to read MCP message: {0}")]
    Read(std::io::Error),
    #[error("failed to write MCP response: {0}")]
    Write(std::io::Error),
}

/// MCP server over a single serial channel.
///
/// Owns the credential store. Messages are handled to completion one at a
/// time, so handlers borrow the store directly.
pub struct McpServer {
    config: RuntimeConfig,
    http: reqwest::Client,
    credentials: CredentialStore,
    session_id: String,
}

impl McpServer {
    pub fn new(config: RuntimeConfig) -> Result<Self, ServerError> {
        Self::with_credentials(config, CredentialStore::new())
    }

    pub fn with_credentials(
        config: RuntimeConfig,
        credentials: CredentialStore,
    ) -> Result<Self, ServerError> {
        let http = client(config.request_timeout)?;
        Ok(Self {
            config,
            http,
            credentials,
            session_id: format!("stdio-{}", Uuid::now_v7()),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn credentials_mut(&mut self) -> &mut CredentialStore {
        &mut self.credentials
    }

    pub async fn serve_stdio(&mut self) -> Result<(), ServerError> {
        let mut reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(&mut reader, &mut stdout).await
    }

    /// Read, handle and answer messages until `reader` reaches EOF.
    pub async fn serve<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let span = info_span!("mcp_session", session_id = %self.session_id);
        async move {
            while let Some(frame) = read_message(reader).await.map_err(ServerError::Read)? {
                let responses = match frame.payload {
                    Ok(incoming) => self.handle_incoming_message(incoming).await,
                    Err(e) => {
                        warn!(error = %e, "unparseable MCP message");
                        vec![error_response(
                            Value::Null,
                            RpcError::new(codes::PARSE_ERROR, format!("Parse error: {e}")),
                        )]
                    }
                };
                for response in responses {
                    write_message(writer, frame.framing, &response)
                        .await
                        .map_err(ServerError::Write)?;
                }
            }
            debug!("input closed, stopping");
            Ok::<(), ServerError>(())
        }
        .instrument(span)
        .await
    }

    pub async fn handle_incoming_message(&mut self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&mut self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Client responses; this server never issues requests of its own.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => {
                let result = self.handle_request(method, params).await;
                Some(match result {
                    Ok(payload) => success_response(id, payload),
                    Err(err) => error_response(id, err),
                })
            }
            None => {
                debug!(method, "notification ignored");
                None
            }
        }
    }

    async fn handle_request(&mut self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Call authenticate_salesforce before any salesforce_* or describe tool, and set_postman_api_key before collection tools. execute_postman_request needs both."
        })
    }

    async fn handle_tools_call(&mut self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        debug!(tool = name, "tool call");
        match self.call_tool(name, &args).await {
            Ok(payload) => Ok(json!({
                "content": [{ "type": "text", "text": to_pretty_json(&payload) }]
            })),
            Err(err) => {
                warn!(tool = name, kind = err.kind(), error = err.message(), "tool call failed");
                Err(err.into())
            }
        }
    }

    /// Dispatch one tool call.
    ///
    /// Credential preconditions are checked before arguments are parsed, so a
    /// call made without credentials fails without touching the network.
    pub async fn call_tool(
        &mut self,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let tool = Tool::from_name(name).ok_or_else(|| ToolError::unknown_tool(name))?;
        match tool {
            Tool::AuthenticateSalesforce => {
                let input = parse_args(tool, args)?;
                self.tool_authenticate_salesforce(input).await
            }
            Tool::SetPostmanApiKey => {
                let input: tools::SetApiKeyInput = parse_args(tool, args)?;
                self.credentials.set_api_key(input.api_key);
                Ok(json!({
                    "success": true,
                    "message": "Postman API key set successfully",
                }))
            }
            Tool::GetPostmanCollection => {
                let api_key = self.credentials.require_api_key()?;
                let input = parse_args(tool, args)?;
                self.tool_get_postman_collection(api_key, input).await
            }
            Tool::ExecutePostmanRequest => {
                let api_key = self.credentials.require_api_key()?;
                let session = self.credentials.require_session()?;
                let input = parse_args(tool, args)?;
                self.tool_execute_postman_request(api_key, session, input)
                    .await
            }
            Tool::SalesforceQuery => {
                let session = self.credentials.require_session()?;
                let input = parse_args(tool, args)?;
                self.tool_salesforce_query(session, input).await
            }
            Tool::SalesforceCreateRecord => {
                let session = self.credentials.require_session()?;
                let input = parse_args(tool, args)?;
                self.tool_salesforce_create_record(session, input).await
            }
            Tool::SalesforceUpdateRecord => {
                let session = self.credentials.require_session()?;
                let input = parse_args(tool, args)?;
                self.tool_salesforce_update_record(session, input).await
            }
            Tool::SalesforceDeleteRecord => {
                let session = self.credentials.require_session()?;
                let input = parse_args(tool, args)?;
                self.tool_salesforce_delete_record(session, input).await
            }
            Tool::DescribeSalesforceObject => {
                let session = self.credentials.require_session()?;
                let input = parse_args(tool, args)?;
                self.tool_describe_salesforce_object(session, input).await
            }
        }
    }
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}
