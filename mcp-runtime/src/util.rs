use std::collections::BTreeMap;
use std::time::Duration;

use postforce_core::error::ToolError;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;

pub fn client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("postforce-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// A completed 2xx upstream exchange.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Single-valued headers map to a string; repeated ones (`set-cookie`) to an array.
    pub headers: BTreeMap<String, Value>,
    pub body: Value,
}

/// Why an upstream call did not produce a 2xx response.
#[derive(Debug)]
pub enum UpstreamFailure {
    /// The request never completed (connect, TLS, timeout, body read).
    Transport(String),
    /// The service answered with a non-success status.
    Status { status: StatusCode, body: Value },
}

impl UpstreamFailure {
    /// Build the tool error: `"<prefix>: <detail>"`, preferring the upstream's
    /// own message as picked by `extract`.
    pub fn into_tool_error(self, prefix: &str, extract: fn(&Value) -> Option<&str>) -> ToolError {
        let detail = match &self {
            UpstreamFailure::Transport(message) => message.clone(),
            UpstreamFailure::Status { status, body } => extract(body)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!("Request failed with status code {}", status.as_u16())
                }),
        };
        ToolError::internal(format!("{prefix}: {detail}"))
    }
}

pub async fn send(request: reqwest::RequestBuilder) -> Result<UpstreamResponse, UpstreamFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| UpstreamFailure::Transport(e.to_string()))?;

    let status = response.status();
    let headers = header_values(response.headers());
    let bytes = response
        .bytes()
        .await
        .map_err(|e| UpstreamFailure::Transport(e.to_string()))?;
    let body = parse_response_body(&bytes);

    if !status.is_success() {
        return Err(UpstreamFailure::Status { status, body });
    }
    Ok(UpstreamResponse {
        status,
        headers,
        body,
    })
}

fn header_values(headers: &HeaderMap) -> BTreeMap<String, Value> {
    headers
        .keys()
        .map(|name| {
            let mut values: Vec<Value> = headers
                .get_all(name)
                .iter()
                .map(|v| Value::String(v.to_str().unwrap_or("<binary>").to_string()))
                .collect();
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            (name.to_string(), value)
        })
        .collect()
}

pub fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

/// OAuth token endpoint: `{"error": "...", "error_description": "..."}`
pub fn oauth_error_description(body: &Value) -> Option<&str> {
    body.get("error_description").and_then(Value::as_str)
}

/// Salesforce REST: `[{"message": "...", "errorCode": "..."}]`
pub fn salesforce_error_message(body: &Value) -> Option<&str> {
    body.get(0)
        .and_then(|first| first.get("message"))
        .and_then(Value::as_str)
}

/// Postman API and generic JSON services: `{"message": ...}` or `{"error": {"message": ...}}`
pub fn postman_error_message(body: &Value) -> Option<&str> {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/error/message").and_then(Value::as_str))
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
