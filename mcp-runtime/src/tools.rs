use postforce_core::error::ToolError;
use postforce_core::template::VariableMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// The fixed tool surface. Names are matched exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    AuthenticateSalesforce,
    SetPostmanApiKey,
    GetPostmanCollection,
    ExecutePostmanRequest,
    SalesforceQuery,
    SalesforceCreateRecord,
    SalesforceUpdateRecord,
    SalesforceDeleteRecord,
    DescribeSalesforceObject,
}

impl Tool {
    pub const ALL: [Tool; 9] = [
        Tool::AuthenticateSalesforce,
        Tool::SetPostmanApiKey,
        Tool::GetPostmanCollection,
        Tool::ExecutePostmanRequest,
        Tool::SalesforceQuery,
        Tool::SalesforceCreateRecord,
        Tool::SalesforceUpdateRecord,
        Tool::SalesforceDeleteRecord,
        Tool::DescribeSalesforceObject,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::AuthenticateSalesforce => "authenticate_salesforce",
            Tool::SetPostmanApiKey => "set_postman_api_key",
            Tool::GetPostmanCollection => "get_postman_collection",
            Tool::ExecutePostmanRequest => "execute_postman_request",
            Tool::SalesforceQuery => "salesforce_query",
            Tool::SalesforceCreateRecord => "salesforce_create_record",
            Tool::SalesforceUpdateRecord => "salesforce_update_record",
            Tool::SalesforceDeleteRecord => "salesforce_delete_record",
            Tool::DescribeSalesforceObject => "describe_salesforce_object",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }
}

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    Tool::ALL.into_iter().map(definition).collect()
}

fn definition(tool: Tool) -> ToolDefinition {
    let (description, input_schema) = match tool {
        Tool::AuthenticateSalesforce => (
            "Authenticate with Salesforce using OAuth2",
            json!({
                "type": "object",
                "properties": {
                    "client_id": { "type": "string", "description": "Salesforce connected app client ID" },
                    "client_secret": { "type": "string", "description": "Salesforce connected app client secret" },
                    "username": { "type": "string", "description": "Salesforce username" },
                    "password": { "type": "string", "description": "Salesforce password + security token" },
                    "login_url": {
                        "type": "string",
                        "description": "Salesforce login URL (default: https://login.salesforce.com)",
                        "default": "https://login.salesforce.com"
                    }
                },
                "required": ["client_id", "client_secret", "username", "password"]
            }),
        ),
        Tool::SetPostmanApiKey => (
            "Set Postman API key for collection management",
            json!({
                "type": "object",
                "properties": {
                    "api_key": { "type": "string", "description": "Postman API key" }
                },
                "required": ["api_key"]
            }),
        ),
        Tool::GetPostmanCollection => (
            "Retrieve a Postman collection by ID",
            json!({
                "type": "object",
                "properties": {
                    "collection_id": { "type": "string", "description": "Postman collection ID" }
                },
                "required": ["collection_id"]
            }),
        ),
        Tool::ExecutePostmanRequest => (
            "Execute a request from a Postman collection",
            json!({
                "type": "object",
                "properties": {
                    "collection_id": { "type": "string", "description": "Postman collection ID" },
                    "request_name": { "type": "string", "description": "Name of the request to execute" },
                    "variables": {
                        "type": "object",
                        "description": "Variables to substitute in the request",
                        "additionalProperties": { "type": "string" }
                    }
                },
                "required": ["collection_id", "request_name"]
            }),
        ),
        Tool::SalesforceQuery => (
            "Execute a SOQL query against Salesforce",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SOQL query string" }
                },
                "required": ["query"]
            }),
        ),
        Tool::SalesforceCreateRecord => (
            "Create a record in Salesforce",
            json!({
                "type": "object",
                "properties": {
                    "sobject": { "type": "string", "description": "Salesforce object type (e.g., Account, Contact)" },
                    "data": { "type": "object", "description": "Record data", "additionalProperties": true }
                },
                "required": ["sobject", "data"]
            }),
        ),
        Tool::SalesforceUpdateRecord => (
            "Update a record in Salesforce",
            json!({
                "type": "object",
                "properties": {
                    "sobject": { "type": "string", "description": "Salesforce object type" },
                    "id": { "type": "string", "description": "Record ID" },
                    "data": { "type": "object", "description": "Updated record data", "additionalProperties": true }
                },
                "required": ["sobject", "id", "data"]
            }),
        ),
        Tool::SalesforceDeleteRecord => (
            "Delete a record in Salesforce",
            json!({
                "type": "object",
                "properties": {
                    "sobject": { "type": "string", "description": "Salesforce object type" },
                    "id": { "type": "string", "description": "Record ID" }
                },
                "required": ["sobject", "id"]
            }),
        ),
        Tool::DescribeSalesforceObject => (
            "Get metadata for a Salesforce object",
            json!({
                "type": "object",
                "properties": {
                    "sobject": { "type": "string", "description": "Salesforce object type" }
                },
                "required": ["sobject"]
            }),
        ),
    };
    ToolDefinition {
        name: tool.name(),
        description,
        input_schema,
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateInput {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub login_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetApiKeyInput {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct GetCollectionInput {
    pub collection_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequestInput {
    pub collection_id: String,
    pub request_name: String,
    #[serde(default)]
    pub variables: Option<VariableMap>,
}

#[derive(Debug, Deserialize)]
pub struct QueryInput {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordInput {
    pub sobject: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordInput {
    pub sobject: String,
    pub id: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct RecordRefInput {
    pub sobject: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct DescribeInput {
    pub sobject: String,
}

/// Deserialize tool arguments into the tool's input type, failing closed.
pub fn parse_args<T: DeserializeOwned>(tool: Tool, args: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| {
        ToolError::invalid_params(format!("Invalid arguments for {}: {e}", tool.name()))
    })
}
