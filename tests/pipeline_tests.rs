// catalog_console/tests/pipeline_tests.rs
// End-to-end command flows through the pipeline against the in-memory backend

use std::sync::Arc;

use catalog_console::conversation::Sender;
use catalog_console::insights::{CatalogUsage, DailyUsage};
use catalog_console::{
    CatalogBackend, CommandError, CommandPipeline, InMemoryBackend, Page, PageContext, PageKind,
    PipelineOutcome, WorkspaceStats,
};

fn pipeline_with(
    kind: PageKind,
    context: PageContext,
    backend: Arc<InMemoryBackend>,
) -> CommandPipeline {
    let page = Page::build(kind).expect("page must build");
    CommandPipeline::new(page, context, backend)
}

#[tokio::test]
async fn workspace_grant_then_analyze() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut p = pipeline_with(PageKind::Workspace, PageContext::default(), backend.clone());

    for command in [
        "create user ann@example.com named Ann",
        "create user bob@example.com",
        "grant select on catalog main to ann@example.com",
        "grant select on catalog main to bob@example.com",
    ] {
        let outcome = p.submit_text(command).await;
        assert!(outcome.is_success(), "{} -> {:?}", command, outcome);
    }
    assert_eq!(
        backend.user_by_email("bob@example.com").unwrap().display_name.as_deref(),
        Some("bob")
    );
    assert_eq!(backend.grants_for("main").len(), 2);

    p.submit_text("analyze").await;
    let report = &p.session().last_message().unwrap().text;
    assert!(report.starts_with("Here's what I found in your workspace:"));
    assert!(report.contains("1. [HIGH] Privilege Concentration"));
    assert!(report.ends_with("Would you like help acting on any of these recommendations?"));
}

#[tokio::test]
async fn tables_page_fills_ambient_catalog_and_schema() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.create_catalog("main", "").await.unwrap();
    backend.create_schema("main", "sales", "").await.unwrap();
    let context = PageContext::with_catalog("main").schema("sales");
    let mut p = pipeline_with(PageKind::Tables, context, backend.clone());

    let outcome = p
        .submit_text(r#"create table orders columns [{"name": "id", "type": "BIGINT"}] metadata {"owner": "etl"}"#)
        .await;
    assert!(outcome.is_success(), "{:?}", outcome);

    let table = backend.table("main", "sales", "orders").unwrap();
    assert_eq!(table.columns.len(), 1);
    assert_eq!(table.columns[0].type_name, "BIGINT");
    assert_eq!(table.metadata["owner"], "etl");
    assert!(table.comment.starts_with("Created via chat assistant on "));
}

#[tokio::test]
async fn malformed_columns_are_reported_without_remote_call() {
    let backend = Arc::new(InMemoryBackend::new());
    let context = PageContext::with_catalog("main").schema("sales");
    let mut p = pipeline_with(PageKind::Tables, context, backend.clone());

    let outcome = p.submit_text("create table orders columns not json").await;
    match outcome {
        PipelineOutcome::Dispatched(d) => {
            assert!(matches!(d.result, Err(CommandError::MalformedPayload { .. })))
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(backend.call_count(), 0);
    assert!(p.session().last_message().unwrap().text.starts_with("Invalid columns:"));
    assert!(!p.session().is_busy());
}

#[tokio::test]
async fn eleven_commands_keep_ten_in_history() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut p = pipeline_with(PageKind::Catalogs, PageContext::default(), backend);

    for i in 0..11 {
        assert!(p.submit_text(&format!("create catalog zone{}", i)).await.is_success());
    }
    let names: Vec<String> = p
        .session()
        .history()
        .map(|h| h.params.get("name").unwrap_or_default().to_string())
        .collect();
    let expected: Vec<String> = (1..11).map(|i| format!("zone{}", i)).collect();
    assert_eq!(names, expected);

    p.submit_text("clear").await;
    assert_eq!(p.session().messages().len(), 1);
    assert_eq!(p.session().history_len(), 0);
}

#[tokio::test]
async fn analysis_failure_is_a_single_error_insight() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.fail_next("stats service unavailable");
    let mut p = pipeline_with(PageKind::Catalogs, PageContext::default(), backend);

    let outcome = p.submit_text("analyze").await;
    assert!(outcome.is_success());
    let report = &p.session().last_message().unwrap().text;
    assert!(report.contains("1. [ERROR] Analysis Failed"));
    assert!(report.contains("stats service unavailable"));
    assert!(!report.contains("2. ["));
}

#[tokio::test]
async fn scripted_stats_trigger_independent_rules() {
    let stats = WorkspaceStats {
        total_users: 100,
        active_users: 20,
        catalog_usage: vec![
            CatalogUsage { name: "lake".into(), value: 80.0 },
            CatalogUsage { name: "sandbox".into(), value: 20.0 },
        ],
        daily_usage: vec![DailyUsage { day: "2024-03-04".into(), queries: 250 }],
        ..Default::default()
    };
    let backend = Arc::new(InMemoryBackend::with_stats(stats));
    let mut p = pipeline_with(PageKind::Workspace, PageContext::default(), backend);

    p.submit_voice("run a health check").await;
    let report = &p.session().last_message().unwrap().text;
    assert!(report.contains("1. [HIGH] Storage Concentration"));
    assert!(report.contains("2. [MEDIUM] Query Spikes"));
    assert!(report.contains("3. [MEDIUM] Low User Engagement"));
}

#[tokio::test]
async fn user_messages_echo_the_rendered_command() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut p = pipeline_with(PageKind::Catalogs, PageContext::default(), backend);

    p.submit_text("create catalog sales comment 'quarterly numbers'").await;
    let messages = p.session().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].sender, Sender::User);
    assert_eq!(messages[1].text, "Create Catalog: name=sales, comment=quarterly numbers");
    assert_eq!(messages[2].text, "Catalog sales has been created successfully.");
}
