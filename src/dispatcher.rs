//! Intent dispatch
//!
//! Maps each intent id to exactly one remote operation, runs it, and turns
//! the result into a bot message. Errors stop here: whatever happens, the
//! session ends up not busy with no intent selected and an empty bag.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{CatalogBackend, ColumnSpec, SecurableType, TableSpec};
use crate::conversation::{ConversationSession, HistoryEntry};
use crate::error::CommandError;
use crate::insights;
use crate::intents::{Intent, ParameterBag};

/// The operations an intent can be bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateUser,
    DeleteUser,
    CreateGroup,
    DeleteGroup,
    CreateCatalog,
    DeleteCatalog,
    CreateSchema,
    DeleteSchema,
    CreateTable,
    DeleteTable,
    GrantPrivileges,
    RevokePrivileges,
    AnalyzeWorkspace,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::CreateUser,
        Action::DeleteUser,
        Action::CreateGroup,
        Action::DeleteGroup,
        Action::CreateCatalog,
        Action::DeleteCatalog,
        Action::CreateSchema,
        Action::DeleteSchema,
        Action::CreateTable,
        Action::DeleteTable,
        Action::GrantPrivileges,
        Action::RevokePrivileges,
        Action::AnalyzeWorkspace,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Action::CreateUser => "create_user",
            Action::DeleteUser => "delete_user",
            Action::CreateGroup => "create_group",
            Action::DeleteGroup => "delete_group",
            Action::CreateCatalog => "create_catalog",
            Action::DeleteCatalog => "delete_catalog",
            Action::CreateSchema => "create_schema",
            Action::DeleteSchema => "delete_schema",
            Action::CreateTable => "create_table",
            Action::DeleteTable => "delete_table",
            Action::GrantPrivileges => "grant_privileges",
            Action::RevokePrivileges => "revoke_privileges",
            Action::AnalyzeWorkspace => "analyze_workspace",
        }
    }

    pub fn from_intent_id(id: &str) -> Option<Self> {
        Action::ALL.iter().copied().find(|a| a.id() == id)
    }
}

/// What happened to one dispatched command
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchOutcome {
    pub intent_id: String,
    /// Bot reply on success, the absorbed error otherwise
    pub result: Result<String, CommandError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Human-readable echo of a command for the user side of the log
pub fn render_command(intent: &Intent, bag: &ParameterBag) -> String {
    let params: Vec<String> = intent
        .parameters
        .iter()
        .filter_map(|p| bag.get(&p.name).map(|v| format!("{}={}", p.name, v)))
        .collect();
    if params.is_empty() {
        intent.label.clone()
    } else {
        format!("{}: {}", intent.label, params.join(", "))
    }
}

/// Comma list -> trimmed, upper-cased privilege names
pub fn split_privileges(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse the raw `columns` text into column definitions
pub fn parse_columns(raw: &str) -> Result<Vec<ColumnSpec>, CommandError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CommandError::malformed("columns", format!("not valid JSON ({})", e)))?;
    if !value.is_array() {
        return Err(CommandError::malformed("columns", "expected a JSON array of columns"));
    }
    serde_json::from_value(value)
        .map_err(|e| CommandError::malformed("columns", format!("bad column definition ({})", e)))
}

/// Parse the raw `metadata` text; absent metadata is an empty object
pub fn parse_metadata(raw: Option<&str>) -> Result<Value, CommandError> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CommandError::malformed("metadata", format!("not valid JSON ({})", e)))?;
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(CommandError::malformed("metadata", "expected a JSON object or array"))
    }
}

fn stamped_comment(bag: &ParameterBag) -> String {
    bag.get_trimmed("comment")
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "Created via chat assistant on {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            )
        })
}

fn required<'b>(bag: &'b ParameterBag, name: &str) -> Result<&'b str, CommandError> {
    bag.get_trimmed(name)
        .ok_or_else(|| CommandError::MissingParameters(vec![name.to_string()]))
}

pub struct Dispatcher {
    backend: Arc<dyn CatalogBackend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn CatalogBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn CatalogBackend> {
        &self.backend
    }

    /// Run one validated command against the session
    pub async fn dispatch(
        &self,
        session: &mut ConversationSession,
        intent: &Intent,
        bag: ParameterBag,
    ) -> DispatchOutcome {
        session.push_history(HistoryEntry::new(&intent.id, bag.clone()));
        session.append_user(render_command(intent, &bag));
        session.set_busy(true);
        info!(intent = %intent.id, "dispatching");

        let result = self.execute(intent, &bag).await;
        match &result {
            Ok(reply) => {
                session.append_bot(reply.clone());
            }
            Err(e) => {
                warn!(intent = %intent.id, kind = ?e.kind(), error = %e, "command failed");
                session.append_bot(e.to_string());
            }
        }

        session.set_busy(false);
        session.clear_selection();
        DispatchOutcome {
            intent_id: intent.id.clone(),
            result,
        }
    }

    async fn execute(&self, intent: &Intent, bag: &ParameterBag) -> Result<String, CommandError> {
        let action = Action::from_intent_id(&intent.id)
            .ok_or_else(|| CommandError::UnknownAction(intent.id.clone()))?;
        let backend = self.backend.as_ref();

        match action {
            Action::CreateUser => {
                let email = required(bag, "email")?;
                let display_name = bag
                    .get_trimmed("displayName")
                    .unwrap_or_else(|| email.split('@').next().unwrap_or(email));
                let user = backend.create_user(email, display_name).await?;
                Ok(format!("User {} has been created successfully.", user.email))
            }
            Action::DeleteUser => {
                let user_id = required(bag, "userId")?;
                backend.delete_user(user_id).await?;
                Ok(format!("User {} has been deleted successfully.", user_id))
            }
            Action::CreateGroup => {
                let name = required(bag, "name")?;
                let source = bag.get_trimmed("source").unwrap_or("internal");
                let group = backend.create_group(name, source).await?;
                Ok(format!("Group {} has been created successfully.", group.name))
            }
            Action::DeleteGroup => {
                let group_id = required(bag, "groupId")?;
                backend.delete_group(group_id).await?;
                Ok(format!("Group {} has been deleted successfully.", group_id))
            }
            Action::CreateCatalog => {
                let name = required(bag, "name")?;
                backend.create_catalog(name, &stamped_comment(bag)).await?;
                Ok(format!("Catalog {} has been created successfully.", name))
            }
            Action::DeleteCatalog => {
                let name = required(bag, "name")?;
                backend.delete_catalog(name).await?;
                Ok(format!("Catalog {} has been deleted successfully.", name))
            }
            Action::CreateSchema => {
                let catalog = required(bag, "catalogName")?;
                let name = required(bag, "name")?;
                backend.create_schema(catalog, name, &stamped_comment(bag)).await?;
                Ok(format!(
                    "Schema {} has been created successfully in catalog {}.",
                    name, catalog
                ))
            }
            Action::DeleteSchema => {
                let catalog = required(bag, "catalogName")?;
                let name = required(bag, "name")?;
                backend.delete_schema(catalog, name).await?;
                Ok(format!(
                    "Schema {} has been deleted successfully from catalog {}.",
                    name, catalog
                ))
            }
            Action::CreateTable => {
                let catalog = required(bag, "catalogName")?;
                let schema = required(bag, "schemaName")?;
                let name = required(bag, "name")?;
                // Both payloads are checked before anything remote happens
                let columns = parse_columns(required(bag, "columns")?)?;
                let metadata = parse_metadata(bag.get_trimmed("metadata"))?;
                let table = TableSpec {
                    name: name.to_string(),
                    columns,
                    comment: stamped_comment(bag),
                    metadata,
                };
                backend.create_table(catalog, schema, &table).await?;
                Ok(format!(
                    "Table {} has been created successfully in {}.{} with {} column(s).",
                    name,
                    catalog,
                    schema,
                    table.columns.len()
                ))
            }
            Action::DeleteTable => {
                let catalog = required(bag, "catalogName")?;
                let schema = required(bag, "schemaName")?;
                let name = required(bag, "name")?;
                backend.delete_table(catalog, schema, name).await?;
                Ok(format!(
                    "Table {} has been deleted successfully from {}.{}.",
                    name, catalog, schema
                ))
            }
            Action::GrantPrivileges | Action::RevokePrivileges => {
                let raw_type = required(bag, "securableType")?;
                let securable = SecurableType::parse(raw_type).ok_or_else(|| {
                    CommandError::malformed(
                        "securableType",
                        format!("'{}' is not one of catalog, schema, table, metastore", raw_type),
                    )
                })?;
                let full_name = required(bag, "fullName")?;
                let principal = required(bag, "principal")?;
                let privileges = split_privileges(required(bag, "privileges")?);
                if privileges.is_empty() {
                    return Err(CommandError::malformed("privileges", "no privileges listed"));
                }
                let listed = privileges.join(", ");
                if action == Action::GrantPrivileges {
                    backend
                        .grant_privileges(securable, full_name, principal, &privileges)
                        .await?;
                    Ok(format!(
                        "Granted {} on {} {} to {}.",
                        listed,
                        securable.as_str(),
                        full_name,
                        principal
                    ))
                } else {
                    backend
                        .revoke_privileges(securable, full_name, principal, &privileges)
                        .await?;
                    Ok(format!(
                        "Revoked {} on {} {} from {}.",
                        listed,
                        securable.as_str(),
                        full_name,
                        principal
                    ))
                }
            }
            Action::AnalyzeWorkspace => {
                let findings = insights::run_analysis(backend).await;
                Ok(insights::format_report(&findings))
            }
        }
    }
}
