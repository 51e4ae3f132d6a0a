//! Page definitions
//!
//! Each console page that hosts the assistant supplies its own greeting,
//! ordered intent catalog, extraction rules and correction vocabulary. The
//! pipeline itself is the same for all of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::extractor::{Capture, ExtractionTable};
use crate::intents::{Intent, IntentCatalog, ParamSpec};

const EMAIL: &str = r"([\w.+-]+@[\w-]+\.[\w.-]+)";
const SECURABLE_TYPE: &str = r"(?i)\bon\s+(catalog|schema|table|metastore)\b";
const SECURABLE_NAME: &str = r"(?i)\bon\s+(?:catalog|schema|table|metastore)\s+(\S+)";
const GRANTEE: &str = r"(?i)\bto\s+(?:user\s+|group\s+|principal\s+)?(\S+)";
const REVOKEE: &str = r"(?i)\bfrom\s+(?:user\s+|group\s+|principal\s+)?(\S+)";

/// Slot labels that are worth correcting alongside the intent phrases
const LABEL_WORDS: &[&str] = &[
    "name", "named", "comment", "columns", "metadata", "privileges", "principal", "email",
    "source", "catalog", "schema", "table", "user", "group",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Users and groups
    Workspace,
    /// Catalog list and catalog detail
    Catalogs,
    /// Schema/table browser inside one catalog
    Tables,
}

impl PageKind {
    pub const ALL: [PageKind; 3] = [PageKind::Workspace, PageKind::Catalogs, PageKind::Tables];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Workspace => "workspace",
            PageKind::Catalogs => "catalogs",
            PageKind::Tables => "tables",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "workspace" | "users" => Ok(PageKind::Workspace),
            "catalogs" | "catalog" => Ok(PageKind::Catalogs),
            "tables" | "table" | "schemas" => Ok(PageKind::Tables),
            other => Err(format!(
                "unknown page '{}' (expected workspace, catalogs or tables)",
                other
            )),
        }
    }
}

/// Everything the pipeline needs to know about one page
#[derive(Clone, Debug)]
pub struct Page {
    pub kind: PageKind,
    pub greeting: String,
    pub catalog: IntentCatalog,
    pub rules: ExtractionTable,
    pub vocabulary: Vec<String>,
}

impl Page {
    pub fn build(kind: PageKind) -> Result<Self, regex::Error> {
        let (greeting, intents) = match kind {
            PageKind::Workspace => (
                "Hi! I can help you manage users and groups, grant or revoke privileges, \
                 and analyze your workspace. Type 'help' to see everything I can do.",
                vec![
                    create_user(),
                    delete_user(),
                    create_group(),
                    delete_group(),
                    grant_privileges(),
                    revoke_privileges(),
                    analyze_workspace(),
                ],
            ),
            PageKind::Catalogs => (
                "Hi! I can help you create and delete catalogs and schemas, manage privileges, \
                 and analyze your workspace. Type 'help' to see everything I can do.",
                vec![
                    create_catalog(),
                    delete_catalog(),
                    create_schema(),
                    delete_schema(),
                    grant_privileges(),
                    revoke_privileges(),
                    analyze_workspace(),
                ],
            ),
            PageKind::Tables => (
                "Hi! I can help you manage the schemas and tables in this catalog. \
                 Type 'help' to see everything I can do.",
                vec![
                    create_table(),
                    delete_table(),
                    create_schema(),
                    delete_schema(),
                    analyze_workspace(),
                ],
            ),
        };

        let catalog = IntentCatalog::new(intents);
        let rules = rules_for(&catalog)?;
        let mut vocabulary = catalog.vocabulary();
        vocabulary.extend(LABEL_WORDS.iter().map(|w| w.to_string()));
        vocabulary.sort();
        vocabulary.dedup();

        Ok(Self {
            kind,
            greeting: greeting.to_string(),
            catalog,
            rules,
            vocabulary,
        })
    }

    /// Same page with a catalog loaded from elsewhere (e.g. YAML); rules are kept
    pub fn with_catalog(mut self, catalog: IntentCatalog) -> Self {
        let mut vocabulary = catalog.vocabulary();
        vocabulary.extend(LABEL_WORDS.iter().map(|w| w.to_string()));
        vocabulary.sort();
        vocabulary.dedup();
        self.catalog = catalog;
        self.vocabulary = vocabulary;
        self
    }
}

fn create_user() -> Intent {
    Intent::new("create_user", "Create User")
        .phrases(&["create user", "add user", "new user", "invite user"])
        .keywords(&["create user", "add user", "new user", "invite"])
        .param(ParamSpec::required("email").with_placeholder("jane@example.com"))
        .param(ParamSpec::optional("displayName").with_placeholder("Jane Doe"))
}

fn delete_user() -> Intent {
    Intent::new("delete_user", "Delete User")
        .phrases(&["delete user", "remove user"])
        .keywords(&["delete user", "remove user", "drop user"])
        .param(ParamSpec::required("userId").with_placeholder("user id or email"))
}

fn create_group() -> Intent {
    Intent::new("create_group", "Create Group")
        .phrases(&["create group", "add group", "new group"])
        .keywords(&["create group", "add group", "new group"])
        .param(ParamSpec::required("name"))
        .param(ParamSpec::optional("source").with_placeholder("internal"))
}

fn delete_group() -> Intent {
    Intent::new("delete_group", "Delete Group")
        .phrases(&["delete group", "remove group"])
        .keywords(&["delete group", "remove group", "drop group"])
        .param(ParamSpec::required("groupId").with_placeholder("group id or name"))
}

fn create_catalog() -> Intent {
    Intent::new("create_catalog", "Create Catalog")
        .phrases(&["create catalog", "add catalog", "new catalog"])
        .keywords(&["create catalog", "new catalog", "add catalog"])
        .param(ParamSpec::required("name"))
        .param(ParamSpec::optional("comment"))
}

fn delete_catalog() -> Intent {
    Intent::new("delete_catalog", "Delete Catalog")
        .phrases(&["delete catalog", "remove catalog", "drop catalog"])
        .keywords(&["delete catalog", "remove catalog", "drop catalog"])
        .param(ParamSpec::required("name"))
}

fn create_schema() -> Intent {
    Intent::new("create_schema", "Create Schema")
        .phrases(&["create schema", "add schema", "new schema"])
        .keywords(&["create schema", "new schema", "add schema"])
        .param(ParamSpec::required("name"))
        .param(ParamSpec::required("catalogName"))
        .param(ParamSpec::optional("comment"))
}

fn delete_schema() -> Intent {
    Intent::new("delete_schema", "Delete Schema")
        .phrases(&["delete schema", "remove schema", "drop schema"])
        .keywords(&["delete schema", "remove schema", "drop schema"])
        .param(ParamSpec::required("name"))
        .param(ParamSpec::required("catalogName"))
}

fn create_table() -> Intent {
    Intent::new("create_table", "Create Table")
        .phrases(&["create table", "add table", "new table"])
        .keywords(&["create table", "new table", "add table"])
        .param(ParamSpec::required("name"))
        .param(ParamSpec::required("catalogName"))
        .param(ParamSpec::required("schemaName"))
        .param(ParamSpec::required("columns").with_placeholder(r#"[{"name": "id", "type": "INT"}]"#))
        .param(ParamSpec::optional("comment"))
        .param(ParamSpec::optional("metadata").with_placeholder(r#"{"owner": "etl"}"#))
}

fn delete_table() -> Intent {
    Intent::new("delete_table", "Delete Table")
        .phrases(&["delete table", "remove table", "drop table"])
        .keywords(&["delete table", "remove table", "drop table"])
        .param(ParamSpec::required("name"))
        .param(ParamSpec::required("catalogName"))
        .param(ParamSpec::required("schemaName"))
}

fn privilege_params(intent: Intent) -> Intent {
    intent
        .param(ParamSpec::required("securableType").with_placeholder("catalog, schema or table"))
        .param(ParamSpec::required("fullName").with_placeholder("main.sales"))
        .param(ParamSpec::required("principal"))
        .param(ParamSpec::required("privileges").with_placeholder("SELECT, MODIFY"))
}

fn grant_privileges() -> Intent {
    privilege_params(
        Intent::new("grant_privileges", "Grant Privileges")
            .phrases(&["grant"])
            .keywords(&["grant", "give access"]),
    )
}

fn revoke_privileges() -> Intent {
    privilege_params(
        Intent::new("revoke_privileges", "Revoke Privileges")
            .phrases(&["revoke"])
            .keywords(&["revoke", "take away", "remove access"]),
    )
}

fn analyze_workspace() -> Intent {
    Intent::new("analyze_workspace", "Analyze Workspace")
        .phrases(&["analyze", "insights"])
        .keywords(&["analyze", "insights", "health check"])
}

/// Extraction rules for every intent in `catalog`
fn rules_for(catalog: &IntentCatalog) -> Result<ExtractionTable, regex::Error> {
    let mut table = ExtractionTable::new();
    for intent in catalog.iter() {
        table = add_rules(table, &intent.id)?;
    }
    Ok(table)
}

fn add_rules(table: ExtractionTable, intent_id: &str) -> Result<ExtractionTable, regex::Error> {
    use Capture::{Json, Text, Word};
    let id = intent_id;
    let privileges = || Capture::Until(vec!["on".into(), "to".into(), "from".into()]);

    let table = match id {
        "create_user" => table
            .pattern(id, "email", EMAIL)?
            .labeled(id, "email", &["email", "user"], Word)?
            .labeled(id, "displayName", &["named", "called", "display name"], Text)?,
        "delete_user" => table
            .pattern(id, "userId", EMAIL)?
            .labeled(id, "userId", &["user", "id"], Word)?,
        "create_group" => table
            .labeled(id, "name", &["named", "called", "name", "group"], Word)?
            .labeled(id, "source", &["source"], Word)?,
        "delete_group" => table.labeled(id, "groupId", &["group", "id"], Word)?,
        "create_catalog" => table
            .labeled(id, "name", &["named", "called", "name", "catalog"], Word)?
            .labeled(id, "comment", &["comment", "description"], Text)?,
        "delete_catalog" => table.labeled(id, "name", &["named", "name", "catalog"], Word)?,
        "create_schema" => table
            .labeled(id, "name", &["named", "called", "name", "schema"], Word)?
            .labeled(id, "catalogName", &["catalog", "in"], Word)?
            .labeled(id, "comment", &["comment", "description"], Text)?,
        "delete_schema" => table
            .labeled(id, "name", &["named", "name", "schema"], Word)?
            .labeled(id, "catalogName", &["catalog", "from", "in"], Word)?,
        "create_table" => table
            .labeled(id, "name", &["named", "called", "table", "name"], Word)?
            .labeled(id, "catalogName", &["catalog"], Word)?
            .labeled(id, "schemaName", &["schema", "in"], Word)?
            .labeled(id, "columns", &["columns", "column"], Json)?
            .labeled(id, "comment", &["comment", "description"], Text)?
            .labeled(id, "metadata", &["metadata"], Json)?,
        "delete_table" => table
            .labeled(id, "name", &["named", "table", "name"], Word)?
            .labeled(id, "catalogName", &["catalog"], Word)?
            .labeled(id, "schemaName", &["schema", "from", "in"], Word)?,
        "grant_privileges" | "revoke_privileges" => {
            let principal = if id == "grant_privileges" { GRANTEE } else { REVOKEE };
            table
                .labeled(id, "privileges", &["privileges", "privilege", "grant", "revoke"], privileges())?
                .pattern(id, "securableType", SECURABLE_TYPE)?
                .labeled(id, "securableType", &["type"], Word)?
                .pattern(id, "fullName", SECURABLE_NAME)?
                .labeled(id, "fullName", &["on"], Word)?
                .pattern(id, "principal", principal)?
                .labeled(id, "principal", &["principal"], Word)?
        }
        _ => table,
    };
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{PageContext, ParameterExtractor};
    use crate::resolver::IntentResolver;
    use crate::validation::validate;

    fn extract(kind: PageKind, ctx: &PageContext, text: &str) -> (String, crate::intents::ParameterBag) {
        let page = Page::build(kind).unwrap();
        let intent = IntentResolver::new(&page.catalog).resolve_phrase(text).unwrap().clone();
        let bag = ParameterExtractor::new(&page.rules, ctx).extract(&intent, text);
        (intent.id, bag)
    }

    #[test]
    fn test_all_pages_build() {
        for kind in PageKind::ALL {
            let page = Page::build(kind).unwrap();
            assert!(!page.catalog.is_empty());
            assert!(page.catalog.get("analyze_workspace").is_some());
            assert!(page.vocabulary.contains(&"create".to_string()));
        }
    }

    #[test]
    fn test_every_parameter_has_a_rule() {
        for kind in PageKind::ALL {
            let page = Page::build(kind).unwrap();
            for intent in page.catalog.iter() {
                for param in &intent.parameters {
                    let has_rule = page.rules.rules_for(&intent.id, &param.name).next().is_some();
                    let has_default = PageContext::with_catalog("c").schema("s").default_for(&param.name).is_some();
                    assert!(has_rule || has_default, "{}.{}", intent.id, param.name);
                }
            }
        }
    }

    #[test]
    fn test_page_kind_parse() {
        assert_eq!("Catalogs".parse::<PageKind>(), Ok(PageKind::Catalogs));
        assert_eq!("users".parse::<PageKind>(), Ok(PageKind::Workspace));
        assert!("billing".parse::<PageKind>().is_err());
    }

    #[test]
    fn test_grant_sentence() {
        let (id, bag) = extract(
            PageKind::Catalogs,
            &PageContext::default(),
            "grant select, modify on schema main.sales to group analysts",
        );
        assert_eq!(id, "grant_privileges");
        assert_eq!(bag.get("privileges"), Some("select, modify"));
        assert_eq!(bag.get("securableType"), Some("schema"));
        assert_eq!(bag.get("fullName"), Some("main.sales"));
        assert_eq!(bag.get("principal"), Some("analysts"));
    }

    #[test]
    fn test_revoke_sentence() {
        let (id, bag) = extract(
            PageKind::Workspace,
            &PageContext::default(),
            "revoke privileges USE_CATALOG on catalog main from bob@example.com",
        );
        assert_eq!(id, "revoke_privileges");
        assert_eq!(bag.get("privileges"), Some("USE_CATALOG"));
        assert_eq!(bag.get("principal"), Some("bob@example.com"));
    }

    #[test]
    fn test_create_user_sentence() {
        let (id, bag) = extract(
            PageKind::Workspace,
            &PageContext::default(),
            "create user jane@example.com named Jane Doe",
        );
        assert_eq!(id, "create_user");
        assert_eq!(bag.get("email"), Some("jane@example.com"));
        assert_eq!(bag.get("displayName"), Some("Jane Doe"));
    }

    #[test]
    fn test_tables_page_uses_ambient_catalog() {
        let ctx = PageContext::with_catalog("main");
        let (id, bag) = extract(
            PageKind::Tables,
            &ctx,
            r#"create table orders in schema sales columns [{"name": "id", "type": "BIGINT"}] comment 'daily orders'"#,
        );
        assert_eq!(id, "create_table");
        assert_eq!(bag.get("name"), Some("orders"));
        assert_eq!(bag.get("catalogName"), Some("main"));
        assert_eq!(bag.get("schemaName"), Some("sales"));
        assert_eq!(bag.get("columns"), Some(r#"[{"name": "id", "type": "BIGINT"}]"#));
        assert_eq!(bag.get("comment"), Some("daily orders"));
        assert!(!bag.contains("metadata"));
    }

    #[test]
    fn test_create_schema_missing_catalog() {
        let page = Page::build(PageKind::Catalogs).unwrap();
        let (id, bag) = extract(PageKind::Catalogs, &PageContext::default(), "create schema s1");
        let intent = page.catalog.get(&id).unwrap();
        assert_eq!(validate(intent, &bag), vec!["catalogName"]);
    }
}
