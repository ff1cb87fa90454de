use std::fmt;

use serde::{Deserialize, Serialize};

/// Authenticated Salesforce context, as returned by the OAuth2 password flow.
///
/// There is no expiry tracking. When the token stops working the caller
/// authenticates again, which replaces the whole session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    /// Org-specific base URL, e.g. `https://acme.my.salesforce.com`
    pub instance_url: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Session {
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            instance_url: instance_url.into(),
            token_type: default_token_type(),
        }
    }

    /// Value for the `Authorization` header on REST calls.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Tokens must never reach the logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("instance_url", &self.instance_url)
            .field("token_type", &self.token_type)
            .finish()
    }
}
