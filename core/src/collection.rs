use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A Postman collection: a tree of reusable HTTP request definitions.
///
/// The tree is read-only once fetched. Names are not unique across it;
/// lookups take the first match in depth-first pre-order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<CollectionInfo>,
    #[serde(default)]
    pub item: Vec<CollectionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Free text or a `{content, type}` object depending on the exporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// A node in the collection tree.
///
/// Anything carrying an `item` array is a folder; anything carrying a
/// `request` is a request. Folder is tried first. Nodes matching neither
/// shape are kept as `Other` and skipped by lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionItem {
    Folder(Folder),
    Request(RequestItem),
    Other(Value),
}

impl CollectionItem {
    pub fn name(&self) -> &str {
        match self {
            CollectionItem::Folder(folder) => &folder.name,
            CollectionItem::Request(request) => &request.name,
            CollectionItem::Other(raw) => raw.get("name").and_then(Value::as_str).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    pub item: Vec<CollectionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestItem {
    pub name: String,
    #[serde(deserialize_with = "definition_or_url")]
    pub request: RequestDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDefinition {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, deserialize_with = "header_list_or_block")]
    pub header: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<RequestUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
}

fn default_method() -> String {
    "GET".to_string()
}

// `"request": "https://..."` is shorthand for a GET of that URL.
fn definition_or_url<'de, D>(deserializer: D) -> Result<RequestDefinition, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shorthand {
        Url(String),
        Definition(RequestDefinition),
    }

    Ok(match Shorthand::deserialize(deserializer)? {
        Shorthand::Url(raw) => RequestDefinition {
            method: default_method(),
            header: Vec::new(),
            url: Some(RequestUrl::Raw(raw)),
            body: None,
        },
        Shorthand::Definition(definition) => definition,
    })
}

// Headers come as `[{key, value}]` or as one `"Key: value\n..."` block.
fn header_list_or_block<'de, D>(deserializer: D) -> Result<Vec<Header>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Headers {
        List(Vec<Header>),
        Block(String),
    }

    Ok(match Headers::deserialize(deserializer)? {
        Headers::List(headers) => headers,
        Headers::Block(block) => block
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| Header {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            })
            .filter(|header| !header.key.is_empty())
            .collect(),
    })
}

impl RequestDefinition {
    /// Raw URL template, placeholders included.
    pub fn url_template(&self) -> Option<&str> {
        match self.url.as_ref()? {
            RequestUrl::Raw(raw) => Some(raw),
            RequestUrl::Detailed(detail) => detail.raw.as_deref(),
        }
    }

    /// Raw body template; empty when the definition has no raw body.
    pub fn body_template(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|body| body.raw.as_deref())
            .unwrap_or_default()
    }
}

/// Declared header. Values are passed through as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestUrl {
    Raw(String),
    Detailed(UrlDetail),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Collection {
    pub fn find_request(&self, name: &str) -> Option<&RequestItem> {
        find_request(&self.item, name)
    }
}

/// Depth-first, pre-order search for the first request item named `name`.
///
/// Folders are never returned; a folder with a matching name is descended into.
pub fn find_request<'a>(items: &'a [CollectionItem], name: &str) -> Option<&'a RequestItem> {
    for item in items {
        match item {
            CollectionItem::Request(request) if request.name == name => return Some(request),
            CollectionItem::Request(_) | CollectionItem::Other(_) => {}
            CollectionItem::Folder(folder) => {
                if let Some(found) = find_request(&folder.item, name) {
                    return Some(found);
                }
            }
        }
    }
    None
}
