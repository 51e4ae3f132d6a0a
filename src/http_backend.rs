//! REST implementation of [`CatalogBackend`]
//!
//! Catalog, schema, table and permission calls go to
//! `/api/2.1/unity-catalog`, users and groups to the SCIM endpoints under
//! `/api/2.0/preview/scim/v2`, statistics to `/api/workspace/stats`.
//! Names are always appended as percent-encoded path segments.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::backend::{BackendError, BackendResult, CatalogBackend, Group, SecurableType, TableSpec, User};
use crate::config::ConsoleConfig;
use crate::insights::WorkspaceStats;

const UNITY_CATALOG: &[&str] = &["api", "2.1", "unity-catalog"];
const SCIM: &[&str] = &["api", "2.0", "preview", "scim", "v2"];
const STATS: &[&str] = &["api", "workspace", "stats"];

pub struct HttpCatalogBackend {
    client: Client,
    base: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScimUser {
    id: String,
    user_name: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScimGroup {
    id: String,
    display_name: String,
    #[serde(default)]
    source: Option<String>,
}

impl HttpCatalogBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> BackendResult<Self> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| BackendError::new(format!("invalid base url '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::new(format!("invalid base url '{}'", base_url)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::new(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base, token })
    }

    pub fn from_config(config: &ConsoleConfig) -> BackendResult<Self> {
        Self::new(
            &config.base_url,
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// `root` followed by `names`, each pushed as its own encoded segment
    pub fn endpoint(&self, root: &[&str], names: &[&str]) -> BackendResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::new(format!("invalid base url '{}'", self.base)))?
            .pop_if_empty()
            .extend(root)
            .extend(names);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, url = %url, "catalog request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::new(format!("request failed: {}", e)))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(&self, builder: RequestBuilder) -> BackendResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::new(format!("unexpected response: {}", e)))
    }

    async fn delete(&self, root: &[&str], names: &[&str]) -> BackendResult<()> {
        let url = self.endpoint(root, names)?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn post(&self, root: &[&str], names: &[&str], body: &Value) -> BackendResult<()> {
        let url = self.endpoint(root, names)?;
        self.send(self.request(Method::POST, url).json(body)).await?;
        Ok(())
    }

    async fn update_permissions(
        &self,
        securable_type: SecurableType,
        full_name: &str,
        change: Value,
    ) -> BackendResult<()> {
        let url = self.endpoint(UNITY_CATALOG, &["permissions", securable_type.as_str(), full_name])?;
        let body = json!({ "changes": [change] });
        self.send(self.request(Method::PATCH, url).json(&body)).await?;
        Ok(())
    }
}

/// Turn an error response into a display message, preferring the server's own
pub fn error_from_body(status: u16, body: &str) -> BackendError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("detail")).or_else(|| v.get("error")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                format!("request failed with status {}", status)
            } else {
                body.to_string()
            }
        });
    BackendError::with_status(status, message)
}

#[async_trait]
impl CatalogBackend for HttpCatalogBackend {
    async fn create_user(&self, email: &str, display_name: &str) -> BackendResult<User> {
        let body = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "userName": email,
            "displayName": display_name,
        });
        let url = self.endpoint(SCIM, &["Users"])?;
        let user: ScimUser = self.send_json(self.request(Method::POST, url).json(&body)).await?;
        Ok(User {
            id: user.id,
            email: user.user_name,
            display_name: user.display_name,
        })
    }

    async fn delete_user(&self, user_id: &str) -> BackendResult<()> {
        self.delete(SCIM, &["Users", user_id]).await
    }

    async fn create_group(&self, name: &str, source: &str) -> BackendResult<Group> {
        let body = json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
            "displayName": name,
            "source": source,
        });
        let url = self.endpoint(SCIM, &["Groups"])?;
        let group: ScimGroup = self.send_json(self.request(Method::POST, url).json(&body)).await?;
        // only what the server echoes back was stored
        Ok(Group {
            id: group.id,
            name: group.display_name,
            source: group.source,
        })
    }

    async fn delete_group(&self, group_id: &str) -> BackendResult<()> {
        self.delete(SCIM, &["Groups", group_id]).await
    }

    async fn create_catalog(&self, name: &str, comment: &str) -> BackendResult<()> {
        let body = json!({ "name": name, "comment": comment });
        self.post(UNITY_CATALOG, &["catalogs"], &body).await
    }

    async fn delete_catalog(&self, catalog_name: &str) -> BackendResult<()> {
        self.delete(UNITY_CATALOG, &["catalogs", catalog_name]).await
    }

    async fn create_schema(&self, catalog_name: &str, name: &str, comment: &str) -> BackendResult<()> {
        let body = json!({ "name": name, "catalog_name": catalog_name, "comment": comment });
        self.post(UNITY_CATALOG, &["schemas"], &body).await
    }

    async fn delete_schema(&self, catalog_name: &str, schema_name: &str) -> BackendResult<()> {
        let full_name = format!("{}.{}", catalog_name, schema_name);
        self.delete(UNITY_CATALOG, &["schemas", &full_name]).await
    }

    async fn create_table(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table: &TableSpec,
    ) -> BackendResult<()> {
        let columns: Vec<Value> = table
            .columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                json!({
                    "name": column.name,
                    "type_name": column.type_name,
                    "type_text": column.type_name.to_lowercase(),
                    "position": position,
                    "nullable": column.nullable,
                    "comment": column.comment,
                })
            })
            .collect();
        let body = json!({
            "name": table.name,
            "catalog_name": catalog_name,
            "schema_name": schema_name,
            "table_type": "MANAGED",
            "columns": columns,
            "comment": table.comment,
            "properties": table.metadata,
        });
        self.post(UNITY_CATALOG, &["tables"], &body).await
    }

    async fn delete_table(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
    ) -> BackendResult<()> {
        let full_name = format!("{}.{}.{}", catalog_name, schema_name, table_name);
        self.delete(UNITY_CATALOG, &["tables", &full_name]).await
    }

    async fn grant_privileges(
        &self,
        securable_type: SecurableType,
        full_name: &str,
        principal: &str,
        privileges: &[String],
    ) -> BackendResult<()> {
        let change = json!({ "principal": principal, "add": privileges });
        self.update_permissions(securable_type, full_name, change).await
    }

    async fn revoke_privileges(
        &self,
        securable_type: SecurableType,
        full_name: &str,
        principal: &str,
        privileges: &[String],
    ) -> BackendResult<()> {
        let change = json!({ "principal": principal, "remove": privileges });
        self.update_permissions(securable_type, full_name, change).await
    }

    async fn get_workspace_stats(&self) -> BackendResult<WorkspaceStats> {
        let url = self.endpoint(STATS, &[])?;
        self.send_json(self.request(Method::GET, url)).await
    }
}
