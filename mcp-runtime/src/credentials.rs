use postforce_core::error::ToolError;
use postforce_core::session::Session;

/// Credentials held by one server instance.
///
/// At most one Salesforce session and one Postman API key exist at a time;
/// each setter replaces the previous value wholesale. Nothing is persisted.
/// The store is owned by the server and requests are served one at a time,
/// so no locking is involved.
#[derive(Debug, Default)]
pub struct CredentialStore {
    session: Option<Session>,
    api_key: Option<String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub(crate) fn require_session(&self) -> Result<&Session, ToolError> {
        self.session()
            .ok_or_else(|| ToolError::invalid_request("Salesforce authentication required"))
    }

    pub(crate) fn require_api_key(&self) -> Result<&str, ToolError> {
        self.api_key()
            .ok_or_else(|| ToolError::invalid_request("Postman API key not set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_fails_preconditions_with_invalid_request() {
        let store = CredentialStore::new();
        let err = store.require_session().unwrap_err();
        assert_eq!(err, ToolError::invalid_request("Salesforce authentication required"));
        let err = store.require_api_key().unwrap_err();
        assert_eq!(err, ToolError::invalid_request("Postman API key not set"));
    }

    #[test]
    fn second_session_replaces_first() {
        let mut store = CredentialStore::new();
        store.set_session(Session::new("first", "https://one.my.salesforce.com"));
        store.set_session(Session::new("second", "https://two.my.salesforce.com"));

        let session = store.require_session().unwrap();
        assert_eq!(session.access_token, "second");
        assert_eq!(session.instance_url, "https://two.my.salesforce.com");
    }

    #[test]
    fn second_api_key_replaces_first() {
        let mut store = CredentialStore::new();
        store.set_api_key("PMAK-1");
        store.set_api_key("PMAK-2");
        assert_eq!(store.api_key(), Some("PMAK-2"));
    }
}
