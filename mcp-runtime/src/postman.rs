//! Postman handlers: fetch a collection, and execute one of its stored
//! requests with Salesforce credentials and caller variables filled in.

use postforce_core::collection::Collection;
use postforce_core::error::ToolError;
use postforce_core::session::Session;
use postforce_core::template::{self, ACCESS_TOKEN, INSTANCE_URL};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::McpServer;
use crate::tools::{ExecuteRequestInput, GetCollectionInput};
use crate::util::{postman_error_message, send};

const FETCH_FAILED: &str = "Failed to fetch Postman collection";
const EXECUTE_FAILED: &str = "Failed to execute Postman request";
const API_KEY_HEADER: &str = "X-API-Key";

/// A stored request after placeholder substitution, ready to send.
#[derive(Debug)]
pub(crate) struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `None` whenever the verb does not carry a body, even if the template had one.
    pub body: Option<String>,
}

impl McpServer {
    pub(crate) async fn tool_get_postman_collection(
        &self,
        api_key: &str,
        input: GetCollectionInput,
    ) -> Result<Value, ToolError> {
        self.fetch_collection(api_key, &input.collection_id, FETCH_FAILED)
            .await
    }

    pub(crate) async fn tool_execute_postman_request(
        &self,
        api_key: &str,
        session: &Session,
        input: ExecuteRequestInput,
    ) -> Result<Value, ToolError> {
        let document = self
            .fetch_collection(api_key, &input.collection_id, EXECUTE_FAILED)
            .await?;
        let collection: Collection = document
            .get("collection")
            .cloned()
            .ok_or_else(|| {
                ToolError::internal(format!(
                    "{EXECUTE_FAILED}: response has no 'collection' field"
                ))
            })
            .and_then(|raw| {
                serde_json::from_value(raw).map_err(|e| {
                    ToolError::internal(format!("{EXECUTE_FAILED}: unreadable collection: {e}"))
                })
            })?;

        let variables = input.variables.unwrap_or_default();
        let prepared = prepare_request(&collection, &input.request_name, session, &variables)?;
        debug!(
            request_name = %input.request_name,
            method = %prepared.method,
            has_body = prepared.body.is_some(),
            "executing stored request"
        );

        let url = Url::parse(&prepared.url).map_err(|e| {
            ToolError::internal(format!(
                "{EXECUTE_FAILED}: invalid URL '{}': {e}",
                prepared.url
            ))
        })?;
        let headers = header_map(&prepared.headers)?;
        let mut request = self.http.request(prepared.method, url).headers(headers);
        if let Some(body) = prepared.body {
            request = request.body(body);
        }

        let response = send(request)
            .await
            .map_err(|failure| failure.into_tool_error(EXECUTE_FAILED, postman_error_message))?;

        Ok(json!({
            "success": true,
            "status": response.status.as_u16(),
            "statusText": response.status.canonical_reason().unwrap_or_default(),
            "headers": response.headers,
            "data": response.body,
        }))
    }

    async fn fetch_collection(
        &self,
        api_key: &str,
        collection_id: &str,
        prefix: &str,
    ) -> Result<Value, ToolError> {
        let mut url = Url::parse(&self.config.postman_api_url).map_err(|e| {
            ToolError::internal(format!(
                "{prefix}: invalid Postman API URL '{}': {e}",
                self.config.postman_api_url
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ToolError::internal(format!(
                    "{prefix}: Postman API URL '{}' cannot carry a path",
                    self.config.postman_api_url
                ))
            })?
            .pop_if_empty()
            .extend(["collections", collection_id]);

        let response = send(self.http.get(url).header(API_KEY_HEADER, api_key))
            .await
            .map_err(|failure| failure.into_tool_error(prefix, postman_error_message))?;
        Ok(response.body)
    }
}

/// Locate `request_name` and fill in its templates.
///
/// Order matters: `{{instance_url}}` is filled in the URL first, then caller
/// variables in URL and body, then `{{access_token}}` in header values.
pub(crate) fn prepare_request(
    collection: &Collection,
    request_name: &str,
    session: &Session,
    variables: &template::VariableMap,
) -> Result<PreparedRequest, ToolError> {
    let item = collection.find_request(request_name).ok_or_else(|| {
        ToolError::invalid_request(format!("Request \"{request_name}\" not found in collection"))
    })?;
    let definition = &item.request;

    let url_template = definition.url_template().ok_or_else(|| {
        ToolError::invalid_request(format!("Request \"{request_name}\" has no URL"))
    })?;
    let url = template::replace_first(url_template, INSTANCE_URL, &session.instance_url);
    let url = variables.apply(&url);
    let body = variables.apply(definition.body_template());

    let headers = definition
        .header
        .iter()
        .map(|h| {
            (
                h.key.clone(),
                template::replace_first(&h.value, ACCESS_TOKEN, &session.access_token),
            )
        })
        .collect();

    let method = parse_method(&definition.method)?;
    let carries_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
    let body = (carries_body && !body.is_empty()).then_some(body);

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body,
    })
}

fn parse_method(raw: &str) -> Result<Method, ToolError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "get" => Ok(Method::GET),
        "post" => Ok(Method::POST),
        "put" => Ok(Method::PUT),
        "patch" => Ok(Method::PATCH),
        "delete" => Ok(Method::DELETE),
        "head" => Ok(Method::HEAD),
        "options" => Ok(Method::OPTIONS),
        other => Method::from_bytes(other.to_ascii_uppercase().as_bytes()).map_err(|_| {
            ToolError::internal(format!("{EXECUTE_FAILED}: unsupported HTTP method '{raw}'"))
        }),
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, ToolError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            ToolError::internal(format!("{EXECUTE_FAILED}: invalid header name '{key}'"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            ToolError::internal(format!("{EXECUTE_FAILED}: invalid value for header '{key}'"))
        })?;
        // A repeated key keeps only its last declared value.
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use postforce_core::template::VariableMap;
    use serde_json::Map;
    use wiremock::matchers::{any, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::RuntimeConfig;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test args must be an object"),
        }
    }

    fn crm_collection(target: &str, method: &str) -> Value {
        json!({
            "info": { "name": "CRM requests", "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json" },
            "item": [
                { "name": "Legacy ping", "request": "https://example.com/ping" },
                { "name": "Half exported", "request": { "method": "GET", "header": null } },
                {
                    "name": "Accounts",
                    "item": [{
                        "name": "Touch Account",
                        "request": {
                            "method": method,
                            "header": [
                                { "key": "Authorization", "value": "Bearer {{access_token}}" },
                                { "key": "Content-Type", "value": "application/json" },
                                { "key": "X-Static", "value": "kept-as-is" }
                            ],
                            "url": { "raw": format!("{target}/services/data/v59.0/sobjects/Account/{{{{id}}}}") },
                            "body": { "mode": "raw", "raw": "{\"Name\":\"{{name}}\"}" }
                        }
                    }]
                }
            ]
        })
    }

    fn session() -> Session {
        Session::new("00Dtoken", "https://acme.my.salesforce.com")
    }

    fn parsed(value: Value) -> Collection {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn prepare_fills_instance_url_variables_and_token() {
        let collection = parsed(crm_collection("{{instance_url}}", "POST"));
        let variables: VariableMap = [("id", "001xx"), ("name", "Acme")].into_iter().collect();

        let prepared =
            prepare_request(&collection, "Touch Account", &session(), &variables).unwrap();

        assert_eq!(prepared.method, Method::POST);
        assert_eq!(
            prepared.url,
            "https://acme.my.salesforce.com/services/data/v59.0/sobjects/Account/001xx"
        );
        assert_eq!(prepared.body.as_deref(), Some("{\"Name\":\"Acme\"}"));
        assert_eq!(
            prepared.headers,
            vec![
                ("Authorization".to_string(), "Bearer 00Dtoken".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Static".to_string(), "kept-as-is".to_string()),
            ]
        );
    }

    #[test]
    fn body_is_dropped_for_verbs_without_payload() {
        let variables: VariableMap = [("id", "1"), ("name", "x")].into_iter().collect();
        for verb in ["GET", "DELETE", "get"] {
            let collection = parsed(crm_collection("{{instance_url}}", verb));
            let prepared =
                prepare_request(&collection, "Touch Account", &session(), &variables).unwrap();
            assert!(prepared.body.is_none(), "{verb}");
        }
        for verb in ["put", "PATCH"] {
            let collection = parsed(crm_collection("{{instance_url}}", verb));
            let prepared =
                prepare_request(&collection, "Touch Account", &session(), &variables).unwrap();
            assert!(prepared.body.is_some(), "{verb}");
        }
    }

    #[test]
    fn instance_url_is_not_substituted_in_body() {
        let collection: Collection = serde_json::from_value(json!({
            "item": [{
                "name": "Echo",
                "request": {
                    "method": "POST",
                    "url": "{{instance_url}}/echo",
                    "body": { "mode": "raw", "raw": "{{instance_url}}" }
                }
            }]
        }))
        .unwrap();
        let prepared =
            prepare_request(&collection, "Echo", &session(), &VariableMap::new()).unwrap();
        assert_eq!(prepared.url, "https://acme.my.salesforce.com/echo");
        assert_eq!(prepared.body.as_deref(), Some("{{instance_url}}"));
    }

    #[test]
    fn unknown_request_name_is_invalid_request() {
        let collection = parsed(crm_collection("{{instance_url}}", "GET"));
        let err = prepare_request(&collection, "Nope", &session(), &VariableMap::new())
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::invalid_request("Request \"Nope\" not found in collection")
        );
    }

    #[tokio::test]
    async fn get_collection_sends_api_key_and_returns_document() {
        let mock = MockServer::start().await;
        let document = json!({ "collection": crm_collection("{{instance_url}}", "GET") });
        Mock::given(method("GET"))
            .and(path("/collections/c-123"))
            .and(header("x-api-key", "PMAK-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document.clone()))
            .expect(1)
            .mount(&mock)
            .await;

        let mut server = McpServer::new(RuntimeConfig {
            postman_api_url: mock.uri(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        server.credentials_mut().set_api_key("PMAK-test");

        let result = server
            .call_tool("get_postman_collection", &args(json!({ "collection_id": "c-123" })))
            .await
            .unwrap();
        assert_eq!(result, document);
    }

    #[tokio::test]
    async fn get_collection_failure_carries_upstream_message() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "name": "instanceNotFoundError", "message": "We could not find the collection you are looking for" }
            })))
            .mount(&mock)
            .await;

        let mut server = McpServer::new(RuntimeConfig {
            postman_api_url: mock.uri(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        server.credentials_mut().set_api_key("PMAK-test");

        let err = server
            .call_tool("get_postman_collection", &args(json!({ "collection_id": "missing" })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::internal(
                "Failed to fetch Postman collection: We could not find the collection you are looking for"
            )
        );
    }

    async fn execute_against(verb: &str) -> (MockServer, Value) {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/c-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "collection": crm_collection(&mock.uri(), verb) })),
            )
            .expect(1)
            .mount(&mock)
            .await;
        Mock::given(method(verb))
            .and(path("/services/data/v59.0/sobjects/Account/001xx"))
            .and(header("authorization", "Bearer 00Dtoken"))
            .and(header("x-static", "kept-as-is"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&mock)
            .await;

        let mut server = McpServer::new(RuntimeConfig {
            postman_api_url: mock.uri(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        server.credentials_mut().set_api_key("PMAK-test");
        server
            .credentials_mut()
            .set_session(Session::new("00Dtoken", mock.uri()));

        let result = server
            .call_tool(
                "execute_postman_request",
                &args(json!({
                    "collection_id": "c-1",
                    "request_name": "Touch Account",
                    "variables": { "id": "001xx", "name": "Acme" }
                })),
            )
            .await
            .unwrap();
        (mock, result)
    }

    #[tokio::test]
    async fn execute_post_attaches_substituted_body() {
        let (mock, result) = execute_against("POST").await;

        assert_eq!(result["success"], true);
        assert_eq!(result["status"], 200);
        assert_eq!(result["statusText"], "OK");
        assert_eq!(result["data"], json!({ "ok": true }));

        let requests = mock.received_requests().await.unwrap();
        let executed = requests
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .unwrap();
        assert_eq!(executed.body, b"{\"Name\":\"Acme\"}".to_vec());
    }

    #[tokio::test]
    async fn execute_get_drops_body() {
        let (mock, result) = execute_against("GET").await;
        assert_eq!(result["status"], 200);

        let requests = mock.received_requests().await.unwrap();
        let executed = requests
            .iter()
            .find(|r| r.url.path().ends_with("/001xx"))
            .unwrap();
        assert!(executed.body.is_empty());
    }

    #[tokio::test]
    async fn execute_unknown_request_is_invalid_request() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/c-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "collection": crm_collection("{{instance_url}}", "GET") }),
            ))
            .expect(1)
            .mount(&mock)
            .await;

        let mut server = McpServer::new(RuntimeConfig {
            postman_api_url: mock.uri(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        server.credentials_mut().set_api_key("PMAK-test");
        server
            .credentials_mut()
            .set_session(Session::new("00Dtoken", mock.uri()));

        let err = server
            .call_tool(
                "execute_postman_request",
                &args(json!({ "collection_id": "c-1", "request_name": "Get User" })),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::invalid_request("Request \"Get User\" not found in collection")
        );
    }

    #[tokio::test]
    async fn execute_failure_reports_upstream_message() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/c-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "collection": crm_collection(&mock.uri(), "PATCH") })),
            )
            .mount(&mock)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "message": "Name is locked" })),
            )
            .mount(&mock)
            .await;

        let mut server = McpServer::new(RuntimeConfig {
            postman_api_url: mock.uri(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        server.credentials_mut().set_api_key("PMAK-test");
        server
            .credentials_mut()
            .set_session(Session::new("00Dtoken", mock.uri()));

        let err = server
            .call_tool(
                "execute_postman_request",
                &args(json!({ "collection_id": "c-1", "request_name": "Touch Account", "variables": { "id": "9" } })),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::internal("Failed to execute Postman request: Name is locked")
        );
    }

    #[tokio::test]
    async fn collection_tools_check_api_key_then_session_without_calls() {
        let mock = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock)
            .await;

        let mut server = McpServer::new(RuntimeConfig {
            postman_api_url: mock.uri(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        let execute = args(json!({ "collection_id": "c-1", "request_name": "Touch Account" }));

        let err = server
            .call_tool("get_postman_collection", &args(json!({ "collection_id": "c-1" })))
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::invalid_request("Postman API key not set"));

        let err = server
            .call_tool("execute_postman_request", &execute)
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::invalid_request("Postman API key not set"));

        server.credentials_mut().set_api_key("PMAK-test");
        let err = server
            .call_tool("execute_postman_request", &execute)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::invalid_request("Salesforce authentication required")
        );
    }

    #[tokio::test]
    async fn unresolved_url_placeholder_is_an_execute_failure() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/c-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "collection": {
                    "item": [{ "name": "Ping", "request": { "url": "{{baseUrl}}/ping" } }]
                }
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let mut server = McpServer::new(RuntimeConfig {
            postman_api_url: mock.uri(),
            ..RuntimeConfig::default()
        })
        .unwrap();
        server.credentials_mut().set_api_key("PMAK-test");
        server
            .credentials_mut()
            .set_session(Session::new("00Dtoken", mock.uri()));

        let err = server
            .call_tool(
                "execute_postman_request",
                &args(json!({ "collection_id": "c-1", "request_name": "Ping" })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Internal(_)));
        assert!(
            err.message()
                .starts_with("Failed to execute Postman request: invalid URL '{{baseUrl}}/ping'")
        );
    }

    #[test]
    fn unreadable_sibling_items_do_not_block_execution() {
        let collection = parsed(crm_collection("{{instance_url}}", "GET"));
        let variables: VariableMap = [("id", "1")].into_iter().collect();
        assert!(prepare_request(&collection, "Touch Account", &session(), &variables).is_ok());

        let legacy =
            prepare_request(&collection, "Legacy ping", &session(), &VariableMap::new()).unwrap();
        assert_eq!(legacy.method, Method::GET);
        assert_eq!(legacy.url, "https://example.com/ping");

        let err = prepare_request(&collection, "Half exported", &session(), &VariableMap::new())
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidRequest(_)));
    }

    #[test]
    fn repeated_header_key_keeps_last_value() {
        let headers = header_map(&[
            ("X-Trace".to_string(), "first".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
            ("x-trace".to_string(), "second".to_string()),
        ])
        .unwrap();
        let traces: Vec<_> = headers.get_all("x-trace").iter().collect();
        assert_eq!(traces, vec![&HeaderValue::from_static("second")]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let err = parse_method("GE T").unwrap_err();
        assert!(matches!(err, ToolError::Internal(_)));
        assert_eq!(parse_method("Patch").unwrap(), Method::PATCH);
        assert_eq!(parse_method("PROPFIND").unwrap().as_str(), "PROPFIND");
    }
}
