//! In-process catalog backend
//!
//! Keeps users, groups, catalogs, schemas, tables and grants in memory.
//! Used by the CLI's `--offline` mode and by tests, which can also inspect
//! the call log and script the next call to fail.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::backend::{
    BackendError, BackendResult, CatalogBackend, Group, SecurableType, TableSpec, User,
};
use crate::insights::{CatalogUsage, WorkspaceStats};

#[derive(Debug, Default)]
struct SchemaEntry {
    tables: BTreeMap<String, TableSpec>,
}

#[derive(Debug, Default)]
struct CatalogEntry {
    comment: String,
    schemas: BTreeMap<String, SchemaEntry>,
}

/// (securable type, full name, principal, privilege)
type Grant = (String, String, String, String);

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    catalogs: BTreeMap<String, CatalogEntry>,
    grants: BTreeSet<Grant>,
    stats: Option<WorkspaceStats>,
    calls: Vec<String>,
    fail_next: Option<String>,
    next_id: u64,
}

impl State {
    fn catalog(&mut self, name: &str) -> BackendResult<&mut CatalogEntry> {
        self.catalogs
            .get_mut(name)
            .ok_or_else(|| BackendError::with_status(404, format!("Catalog '{}' does not exist.", name)))
    }

    fn schema(&mut self, catalog: &str, schema: &str) -> BackendResult<&mut SchemaEntry> {
        self.catalog(catalog)?.schemas.get_mut(schema).ok_or_else(|| {
            BackendError::with_status(404, format!("Schema '{}.{}' does not exist.", catalog, schema))
        })
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a fixed snapshot instead of one derived from current state
    pub fn with_stats(stats: WorkspaceStats) -> Self {
        let backend = Self::new();
        backend.lock_or_recover().stats = Some(stats);
        backend
    }

    /// Make the next call fail with `message`
    pub fn fail_next(&self, message: &str) {
        self.lock_or_recover().fail_next = Some(message.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.lock_or_recover().calls.len()
    }

    /// Operation names in call order
    pub fn calls(&self) -> Vec<String> {
        self.lock_or_recover().calls.clone()
    }

    pub fn has_catalog(&self, name: &str) -> bool {
        self.lock_or_recover().catalogs.contains_key(name)
    }

    pub fn has_schema(&self, catalog: &str, schema: &str) -> bool {
        self.lock_or_recover()
            .catalogs
            .get(catalog)
            .is_some_and(|c| c.schemas.contains_key(schema))
    }

    pub fn table(&self, catalog: &str, schema: &str, table: &str) -> Option<TableSpec> {
        self.lock_or_recover()
            .catalogs
            .get(catalog)
            .and_then(|c| c.schemas.get(schema))
            .and_then(|s| s.tables.get(table))
            .cloned()
    }

    pub fn catalog_comment(&self, name: &str) -> Option<String> {
        self.lock_or_recover().catalogs.get(name).map(|c| c.comment.clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.lock_or_recover()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    /// (principal, privilege) pairs granted on `full_name`
    pub fn grants_for(&self, full_name: &str) -> Vec<(String, String)> {
        self.lock_or_recover()
            .grants
            .iter()
            .filter(|(_, name, _, _)| name == full_name)
            .map(|(_, _, principal, privilege)| (principal.clone(), privilege.clone()))
            .collect()
    }

    fn lock_or_recover(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock, log the call and fire any scripted failure
    fn begin(&self, operation: &str) -> BackendResult<MutexGuard<'_, State>> {
        let mut state = self.lock_or_recover();
        state.calls.push(operation.to_string());
        let scripted = state.fail_next.take();
        match scripted {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(state),
        }
    }

    fn derived_stats(state: &State) -> WorkspaceStats {
        let mut distribution: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        for (_, _, principal, privilege) in &state.grants {
            distribution
                .entry(privilege.clone())
                .or_default()
                .insert(principal.as_str());
        }
        WorkspaceStats {
            total_catalogs: state.catalogs.len() as u64,
            total_schemas: state.catalogs.values().map(|c| c.schemas.len() as u64).sum(),
            total_tables: state
                .catalogs
                .values()
                .flat_map(|c| c.schemas.values())
                .map(|s| s.tables.len() as u64)
                .sum(),
            total_users: state.users.len() as u64,
            active_users: state.users.len() as u64,
            catalog_usage: state
                .catalogs
                .iter()
                .map(|(name, c)| CatalogUsage {
                    name: name.clone(),
                    value: c.schemas.values().map(|s| s.tables.len() as f64).sum(),
                })
                .collect(),
            privilege_distribution: distribution
                .into_iter()
                .map(|(privilege, principals)| (privilege, principals.len() as u64))
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CatalogBackend for InMemoryBackend {
    async fn create_user(&self, email: &str, display_name: &str) -> BackendResult<User> {
        let mut state = self.begin("create_user")?;
        if state.users.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(BackendError::with_status(409, format!("User '{}' already exists.", email)));
        }
        let user = User {
            id: state.next_id("u"),
            email: email.to_string(),
            display_name: Some(display_name.to_string()),
        };
        state.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> BackendResult<()> {
        let mut state = self.begin("delete_user")?;
        let key = state
            .users
            .values()
            .find(|u| u.id == user_id || u.email.eq_ignore_ascii_case(user_id))
            .map(|u| u.id.clone())
            .ok_or_else(|| BackendError::with_status(404, format!("User '{}' not found.", user_id)))?;
        state.users.remove(&key);
        Ok(())
    }

    async fn create_group(&self, name: &str, source: &str) -> BackendResult<Group> {
        let mut state = self.begin("create_group")?;
        if state.groups.values().any(|g| g.name == name) {
            return Err(BackendError::with_status(409, format!("Group '{}' already exists.", name)));
        }
        let group = Group {
            id: state.next_id("g"),
            name: name.to_string(),
            source: Some(source.to_string()),
        };
        state.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn delete_group(&self, group_id: &str) -> BackendResult<()> {
        let mut state = self.begin("delete_group")?;
        let key = state
            .groups
            .values()
            .find(|g| g.id == group_id || g.name == group_id)
            .map(|g| g.id.clone())
            .ok_or_else(|| BackendError::with_status(404, format!("Group '{}' not found.", group_id)))?;
        state.groups.remove(&key);
        Ok(())
    }

    async fn create_catalog(&self, name: &str, comment: &str) -> BackendResult<()> {
        let mut state = self.begin("create_catalog")?;
        if state.catalogs.contains_key(name) {
            return Err(BackendError::with_status(409, format!("Catalog '{}' already exists.", name)));
        }
        state.catalogs.insert(
            name.to_string(),
            CatalogEntry {
                comment: comment.to_string(),
                schemas: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_catalog(&self, catalog_name: &str) -> BackendResult<()> {
        let mut state = self.begin("delete_catalog")?;
        state.catalog(catalog_name)?;
        state.catalogs.remove(catalog_name);
        Ok(())
    }

    async fn create_schema(&self, catalog_name: &str, name: &str, _comment: &str) -> BackendResult<()> {
        let mut state = self.begin("create_schema")?;
        let catalog = state.catalog(catalog_name)?;
        if catalog.schemas.contains_key(name) {
            return Err(BackendError::with_status(
                409,
                format!("Schema '{}.{}' already exists.", catalog_name, name),
            ));
        }
        catalog.schemas.insert(name.to_string(), SchemaEntry::default());
        Ok(())
    }

    async fn delete_schema(&self, catalog_name: &str, schema_name: &str) -> BackendResult<()> {
        let mut state = self.begin("delete_schema")?;
        state.schema(catalog_name, schema_name)?;
        state.catalog(catalog_name)?.schemas.remove(schema_name);
        Ok(())
    }

    async fn create_table(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table: &TableSpec,
    ) -> BackendResult<()> {
        let mut state = self.begin("create_table")?;
        let schema = state.schema(catalog_name, schema_name)?;
        if schema.tables.contains_key(&table.name) {
            return Err(BackendError::with_status(
                409,
                format!("Table '{}.{}.{}' already exists.", catalog_name, schema_name, table.name),
            ));
        }
        schema.tables.insert(table.name.clone(), table.clone());
        Ok(())
    }

    async fn delete_table(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
    ) -> BackendResult<()> {
        let mut state = self.begin("delete_table")?;
        let schema = state.schema(catalog_name, schema_name)?;
        schema.tables.remove(table_name).ok_or_else(|| {
            BackendError::with_status(
                404,
                format!("Table '{}.{}.{}' does not exist.", catalog_name, schema_name, table_name),
            )
        })?;
        Ok(())
    }

    async fn grant_privileges(
        &self,
        securable_type: SecurableType,
        full_name: &str,
        principal: &str,
        privileges: &[String],
    ) -> BackendResult<()> {
        let mut state = self.begin("grant_privileges")?;
        for privilege in privileges {
            state.grants.insert((
                securable_type.as_str().to_string(),
                full_name.to_string(),
                principal.to_string(),
                privilege.clone(),
            ));
        }
        Ok(())
    }

    async fn revoke_privileges(
        &self,
        securable_type: SecurableType,
        full_name: &str,
        principal: &str,
        privileges: &[String],
    ) -> BackendResult<()> {
        let mut state = self.begin("revoke_privileges")?;
        for privilege in privileges {
            state.grants.remove(&(
                securable_type.as_str().to_string(),
                full_name.to_string(),
                principal.to_string(),
                privilege.clone(),
            ));
        }
        Ok(())
    }

    async fn get_workspace_stats(&self) -> BackendResult<WorkspaceStats> {
        let state = self.begin("get_workspace_stats")?;
        Ok(match &state.stats {
            Some(stats) => stats.clone(),
            None => Self::derived_stats(&state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catalog_schema_table_lifecycle() {
        let backend = InMemoryBackend::new();
        backend.create_catalog("main", "c").await.unwrap();
        backend.create_schema("main", "sales", "").await.unwrap();
        let table = TableSpec {
            name: "orders".into(),
            columns: vec![],
            comment: String::new(),
            metadata: serde_json::json!({}),
        };
        backend.create_table("main", "sales", &table).await.unwrap();
        assert!(backend.table("main", "sales", "orders").is_some());

        let err = backend.create_table("main", "sales", &table).await.unwrap_err();
        assert_eq!(err.status, Some(409));

        backend.delete_table("main", "sales", "orders").await.unwrap();
        backend.delete_schema("main", "sales").await.unwrap();
        assert!(!backend.has_schema("main", "sales"));
        backend.delete_catalog("main").await.unwrap();
        assert!(!backend.has_catalog("main"));
        assert_eq!(backend.call_count(), 7);
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.create_schema("ghost", "s", "").await.unwrap_err();
        assert_eq!(err.message, "Catalog 'ghost' does not exist.");
    }

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let backend = InMemoryBackend::new();
        backend.fail_next("boom");
        assert_eq!(backend.delete_catalog("x").await.unwrap_err().message, "boom");
        assert_eq!(
            backend.delete_catalog("x").await.unwrap_err().message,
            "Catalog 'x' does not exist."
        );
        assert_eq!(backend.calls(), vec!["delete_catalog", "delete_catalog"]);
    }

    #[tokio::test]
    async fn test_users_delete_by_id_or_email() {
        let backend = InMemoryBackend::new();
        let user = backend.create_user("a@example.com", "A").await.unwrap();
        backend.create_user("b@example.com", "B").await.unwrap();
        backend.delete_user(&user.id).await.unwrap();
        backend.delete_user("B@example.com").await.unwrap();
        assert!(backend.user_by_email("a@example.com").is_none());
        assert!(backend.delete_user("a@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_derived_stats_count_principals() {
        let backend = InMemoryBackend::new();
        backend.create_catalog("main", "").await.unwrap();
        backend.create_user("a@example.com", "A").await.unwrap();
        let privileges = vec!["SELECT".to_string()];
        backend
            .grant_privileges(SecurableType::Catalog, "main", "a@example.com", &privileges)
            .await
            .unwrap();
        backend
            .grant_privileges(SecurableType::Schema, "main.s", "a@example.com", &privileges)
            .await
            .unwrap();

        let stats = backend.get_workspace_stats().await.unwrap();
        assert_eq!(stats.total_catalogs, 1);
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.privilege_distribution["SELECT"], 1);
    }
}
