//! Remote catalog operations consumed by the dispatcher
//!
//! The console never implements these; it only calls them. Every call
//! either resolves or fails with a [`BackendError`] whose message is shown
//! to the user verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::insights::WorkspaceStats;

/// Failure reported by the remote service
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct BackendError {
    /// HTTP status when the failure came from a response
    pub status: Option<u16>,
    /// Display text
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// One column of a table definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", alias = "type_name", alias = "typeName")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// Payload for `create_table`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub comment: String,
    /// JSON object or array as supplied by the user
    pub metadata: serde_json::Value,
}

/// Kind of object a privilege is granted on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurableType {
    Catalog,
    Schema,
    Table,
    Metastore,
}

impl SecurableType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "catalog" | "catalogs" => Some(SecurableType::Catalog),
            "schema" | "schemas" => Some(SecurableType::Schema),
            "table" | "tables" => Some(SecurableType::Table),
            "metastore" => Some(SecurableType::Metastore),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurableType::Catalog => "catalog",
            SecurableType::Schema => "schema",
            SecurableType::Table => "table",
            SecurableType::Metastore => "metastore",
        }
    }
}

/// The remote operations the command pipeline can invoke
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn create_user(&self, email: &str, display_name: &str) -> BackendResult<User>;

    async fn delete_user(&self, user_id: &str) -> BackendResult<()>;

    async fn create_group(&self, name: &str, source: &str) -> BackendResult<Group>;

    async fn delete_group(&self, group_id: &str) -> BackendResult<()>;

    async fn create_catalog(&self, name: &str, comment: &str) -> BackendResult<()>;

    async fn delete_catalog(&self, catalog_name: &str) -> BackendResult<()>;

    async fn create_schema(&self, catalog_name: &str, name: &str, comment: &str) -> BackendResult<()>;

    async fn delete_schema(&self, catalog_name: &str, schema_name: &str) -> BackendResult<()>;

    async fn create_table(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table: &TableSpec,
    ) -> BackendResult<()>;

    async fn delete_table(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
    ) -> BackendResult<()>;

    async fn grant_privileges(
        &self,
        securable_type: SecurableType,
        full_name: &str,
        principal: &str,
        privileges: &[String],
    ) -> BackendResult<()>;

    async fn revoke_privileges(
        &self,
        securable_type: SecurableType,
        full_name: &str,
        principal: &str,
        privileges: &[String],
    ) -> BackendResult<()>;

    async fn get_workspace_stats(&self) -> BackendResult<WorkspaceStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_securable_type_parse() {
        assert_eq!(SecurableType::parse(" Catalog "), Some(SecurableType::Catalog));
        assert_eq!(SecurableType::parse("tables"), Some(SecurableType::Table));
        assert_eq!(SecurableType::parse("volume"), None);
        assert_eq!(SecurableType::Schema.as_str(), "schema");
    }

    #[test]
    fn test_column_spec_accepts_type_key() {
        let col: ColumnSpec = serde_json::from_str(r#"{"name": "id", "type": "INT"}"#).unwrap();
        assert_eq!(col.type_name, "INT");
        assert!(col.nullable);
        assert!(col.comment.is_none());
    }
}
