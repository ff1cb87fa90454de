use thiserror::Error;

/// Failure of a single tool call, surfaced to the MCP client as a JSON-RPC error.
///
/// Every variant is terminal for the call that produced it. Nothing retries,
/// and producing one never touches stored credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// A precondition is missing: credentials not set, or a named request absent.
    #[error("{0}")]
    InvalidRequest(String),
    /// Tool arguments did not match the tool's input shape.
    #[error("{0}")]
    InvalidParams(String),
    /// The tool name is not part of the served surface.
    #[error("{0}")]
    MethodNotFound(String),
    /// An outbound HTTP call failed; carries the most specific upstream message.
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::MethodNotFound(format!("Unknown tool: {name}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// JSON-RPC error code for this kind.
    pub fn code(&self) -> i64 {
        match self {
            ToolError::InvalidRequest(_) => codes::INVALID_REQUEST,
            ToolError::InvalidParams(_) => codes::INVALID_PARAMS,
            ToolError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            ToolError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Short machine-readable name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidRequest(_) => "invalid_request",
            ToolError::InvalidParams(_) => "invalid_params",
            ToolError::MethodNotFound(_) => "method_not_found",
            ToolError::Internal(_) => "internal_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ToolError::InvalidRequest(m)
            | ToolError::InvalidParams(m)
            | ToolError::MethodNotFound(m)
            | ToolError::Internal(m) => m,
        }
    }
}

/// JSON-RPC 2.0 error codes used across the server
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
