//! Salesforce handlers: OAuth2 password-flow login plus thin wrappers over the
//! REST data API (`/services/data/<version>/...`).

use postforce_core::error::ToolError;
use postforce_core::session::Session;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};
use tracing::info;
use url::Url;

use crate::McpServer;
use crate::tools::{
    AuthenticateInput, CreateRecordInput, DescribeInput, QueryInput, RecordRefInput,
    UpdateRecordInput,
};
use crate::util::{oauth_error_description, salesforce_error_message, send};

const AUTH_FAILED: &str = "Salesforce authentication failed";
const QUERY_FAILED: &str = "Salesforce query failed";
const CREATE_FAILED: &str = "Failed to create Salesforce record";
const UPDATE_FAILED: &str = "Failed to update Salesforce record";
const DELETE_FAILED: &str = "Failed to delete Salesforce record";
const DESCRIBE_FAILED: &str = "Failed to describe Salesforce object";

impl McpServer {
    pub(crate) async fn tool_authenticate_salesforce(
        &mut self,
        input: AuthenticateInput,
    ) -> Result<Value, ToolError> {
        let login_url = input
            .login_url
            .unwrap_or_else(|| self.config.salesforce_login_url.clone());
        let token_url = format!(
            "{}/services/oauth2/token",
            login_url.trim_end_matches('/')
        );
        let form = [
            ("grant_type", "password"),
            ("client_id", input.client_id.as_str()),
            ("client_secret", input.client_secret.as_str()),
            ("username", input.username.as_str()),
            ("password", input.password.as_str()),
        ];

        let response = send(self.http.post(&token_url).form(&form))
            .await
            .map_err(|failure| failure.into_tool_error(AUTH_FAILED, oauth_error_description))?;
        let session: Session = serde_json::from_value(response.body).map_err(|e| {
            ToolError::internal(format!("{AUTH_FAILED}: unexpected token response: {e}"))
        })?;

        let instance_url = session.instance_url.clone();
        self.credentials.set_session(session);
        info!(instance_url = %instance_url, "salesforce session established");

        Ok(json!({
            "success": true,
            "message": "Successfully authenticated with Salesforce",
            "instance_url": instance_url,
        }))
    }

    pub(crate) async fn tool_salesforce_query(
        &self,
        session: &Session,
        input: QueryInput,
    ) -> Result<Value, ToolError> {
        let mut url = self.data_url(session, &["query"], QUERY_FAILED)?;
        url.query_pairs_mut().append_pair("q", &input.query);

        let response = send(
            self.http
                .get(url)
                .header(AUTHORIZATION, session.bearer()),
        )
        .await
        .map_err(|failure| failure.into_tool_error(QUERY_FAILED, salesforce_error_message))?;
        Ok(response.body)
    }

    pub(crate) async fn tool_salesforce_create_record(
        &self,
        session: &Session,
        input: CreateRecordInput,
    ) -> Result<Value, ToolError> {
        let url = self.data_url(session, &["sobjects", &input.sobject], CREATE_FAILED)?;

        let response = send(
            self.http
                .post(url)
                .header(AUTHORIZATION, session.bearer())
                .header(CONTENT_TYPE, "application/json")
                .json(&input.data),
        )
        .await
        .map_err(|failure| failure.into_tool_error(CREATE_FAILED, salesforce_error_message))?;
        Ok(response.body)
    }

    pub(crate) async fn tool_salesforce_update_record(
        &self,
        session: &Session,
        input: UpdateRecordInput,
    ) -> Result<Value, ToolError> {
        let url = self.data_url(
            session,
            &["sobjects", &input.sobject, &input.id],
            UPDATE_FAILED,
        )?;

        // 204 No Content on success; nothing to forward.
        send(
            self.http
                .patch(url)
                .header(AUTHORIZATION, session.bearer())
                .header(CONTENT_TYPE, "application/json")
                .json(&input.data),
        )
        .await
        .map_err(|failure| failure.into_tool_error(UPDATE_FAILED, salesforce_error_message))?;

        Ok(json!({
            "success": true,
            "message": "Record updated successfully",
            "id": input.id,
        }))
    }

    pub(crate) async fn tool_salesforce_delete_record(
        &self,
        session: &Session,
        input: RecordRefInput,
    ) -> Result<Value, ToolError> {
        let url = self.data_url(
            session,
            &["sobjects", &input.sobject, &input.id],
            DELETE_FAILED,
        )?;

        send(
            self.http
                .delete(url)
                .header(AUTHORIZATION, session.bearer()),
        )
        .await
        .map_err(|failure| failure.into_tool_error(DELETE_FAILED, salesforce_error_message))?;

        Ok(json!({
            "success": true,
            "message": "Record deleted successfully",
            "id": input.id,
        }))
    }

    pub(crate) async fn tool_describe_salesforce_object(
        &self,
        session: &Session,
        input: DescribeInput,
    ) -> Result<Value, ToolError> {
        let url = self.data_url(
            session,
            &["sobjects", &input.sobject, "describe"],
            DESCRIBE_FAILED,
        )?;

        let response = send(
            self.http
                .get(url)
                .header(AUTHORIZATION, session.bearer()),
        )
        .await
        .map_err(|failure| failure.into_tool_error(DESCRIBE_FAILED, salesforce_error_message))?;
        Ok(response.body)
    }

    /// `<instance_url>/services/data/<version>/<segments...>`, each segment percent-encoded.
    fn data_url(
        &self,
        session: &Session,
        segments: &[&str],
        prefix: &str,
    ) -> Result<Url, ToolError> {
        let mut url = Url::parse(&session.instance_url).map_err(|e| {
            ToolError::internal(format!(
                "{prefix}: invalid instance URL '{}': {e}",
                session.instance_url
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ToolError::internal(format!(
                    "{prefix}: instance URL '{}' cannot carry a path",
                    session.instance_url
                ))
            })?
            .pop_if_empty()
            .extend(["services", "data", self.config.salesforce_api_version.as_str()])
            .extend(segments);
        Ok(url)
    }
}
