//! Workspace insight engine
//!
//! Turns a usage snapshot into findings. The rules are independent: each
//! one is evaluated every time, in a fixed order, and every firing rule
//! contributes its own insight.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use crate::backend::{BackendError, CatalogBackend};

/// Share of total catalog usage above which one catalog is a hotspot
pub const STORAGE_SHARE_LIMIT: f64 = 0.30;
/// Daily query count above which a day is a spike
pub const DAILY_QUERY_LIMIT: u64 = 100;
/// Active/total user ratio below which engagement is low
pub const ENGAGEMENT_FLOOR: f64 = 0.30;
/// Share of users holding one privilege above which it is over-granted
pub const PRIVILEGE_SHARE_LIMIT: f64 = 0.50;
/// Query duration above which a query counts as problematic
pub const SLOW_QUERY_DURATION: f64 = 60.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogUsage {
    pub name: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub day: String,
    pub queries: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuerySample {
    pub status: String,
    pub duration: f64,
}

/// Snapshot of workspace statistics, fetched fresh for every analysis
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceStats {
    pub total_catalogs: u64,
    pub total_schemas: u64,
    pub total_tables: u64,
    pub total_users: u64,
    pub active_users: u64,
    pub catalog_usage: Vec<CatalogUsage>,
    pub daily_usage: Vec<DailyUsage>,
    pub recent_queries: Vec<QuerySample>,
    pub privilege_distribution: BTreeMap<String, u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// One finding with what to do about it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendation: String,
}

impl Insight {
    fn new(severity: Severity, title: &str, description: String, recommendation: String) -> Self {
        Self {
            severity,
            title: title.to_string(),
            description,
            recommendation,
        }
    }

    pub fn no_issues() -> Self {
        Self::new(
            Severity::Low,
            "No Critical Issues",
            "Your workspace looks healthy. No usage, access or query problems were detected.".into(),
            "Keep monitoring usage and re-run the analysis periodically.".into(),
        )
    }

    pub fn analysis_failed(reason: &str) -> Self {
        Self::new(
            Severity::Error,
            "Analysis Failed",
            format!("Could not retrieve workspace statistics: {}", reason),
            "Check your connection and permissions, then try again.".into(),
        )
    }
}

type Rule = fn(&WorkspaceStats) -> Option<Insight>;

/// Rules in evaluation order
const RULES: &[Rule] = &[
    storage_concentration,
    query_spikes,
    low_engagement,
    privilege_concentration,
    problematic_queries,
];

/// Run every rule over `stats`
pub fn analyze(stats: &WorkspaceStats) -> Vec<Insight> {
    let insights: Vec<Insight> = RULES.iter().filter_map(|rule| rule(stats)).collect();
    info!(findings = insights.len(), "workspace analysis complete");
    if insights.is_empty() {
        return vec![Insight::no_issues()];
    }
    insights
}

/// Analyze a fetch result, turning a fetch failure into one Error insight
pub fn analyze_result(stats: Result<WorkspaceStats, BackendError>) -> Vec<Insight> {
    match stats {
        Ok(stats) => analyze(&stats),
        Err(e) => {
            warn!(error = %e, "workspace stats unavailable");
            vec![Insight::analysis_failed(&e.message)]
        }
    }
}

/// Fetch a fresh snapshot and analyze it
pub async fn run_analysis(backend: &dyn CatalogBackend) -> Vec<Insight> {
    analyze_result(backend.get_workspace_stats().await)
}

fn percent(part: f64, whole: f64) -> f64 {
    part / whole * 100.0
}

fn storage_concentration(stats: &WorkspaceStats) -> Option<Insight> {
    let total: f64 = stats.catalog_usage.iter().map(|c| c.value).sum();
    if total <= 0.0 {
        return None;
    }
    let hot: Vec<String> = stats
        .catalog_usage
        .iter()
        .filter(|c| c.value / total > STORAGE_SHARE_LIMIT)
        .map(|c| format!("{} ({:.1}%)", c.name, percent(c.value, total)))
        .collect();
    if hot.is_empty() {
        return None;
    }
    Some(Insight::new(
        Severity::High,
        "Storage Concentration",
        format!(
            "{} more than {:.0}% of total catalog usage: {}.",
            if hot.len() == 1 { "One catalog accounts for" } else { "Several catalogs each account for" },
            STORAGE_SHARE_LIMIT * 100.0,
            hot.join(", ")
        ),
        "Consider splitting heavy catalogs or archiving cold tables to balance storage.".into(),
    ))
}

fn query_spikes(stats: &WorkspaceStats) -> Option<Insight> {
    let spikes: Vec<String> = stats
        .daily_usage
        .iter()
        .filter(|d| d.queries > DAILY_QUERY_LIMIT)
        .map(|d| format!("{} ({} queries)", d.day, d.queries))
        .collect();
    if spikes.is_empty() {
        return None;
    }
    Some(Insight::new(
        Severity::Medium,
        "Query Spikes",
        format!(
            "Query volume exceeded {} per day on: {}.",
            DAILY_QUERY_LIMIT,
            spikes.join(", ")
        ),
        "Review workloads scheduled on those days and consider caching or spreading batch jobs.".into(),
    ))
}

fn low_engagement(stats: &WorkspaceStats) -> Option<Insight> {
    if stats.total_users == 0 {
        return None;
    }
    let ratio = stats.active_users as f64 / stats.total_users as f64;
    if ratio >= ENGAGEMENT_FLOOR {
        return None;
    }
    Some(Insight::new(
        Severity::Medium,
        "Low User Engagement",
        format!(
            "Only {} of {} users ({:.1}%) are active.",
            stats.active_users,
            stats.total_users,
            ratio * 100.0
        ),
        "Reach out to inactive users with onboarding material, or remove accounts that are no longer needed.".into(),
    ))
}

fn privilege_concentration(stats: &WorkspaceStats) -> Option<Insight> {
    if stats.total_users == 0 {
        return None;
    }
    let total = stats.total_users as f64;
    let broad: Vec<String> = stats
        .privilege_distribution
        .iter()
        .filter(|(_, count)| **count as f64 / total > PRIVILEGE_SHARE_LIMIT)
        .map(|(name, count)| format!("{} ({:.1}% of users)", name, percent(*count as f64, total)))
        .collect();
    if broad.is_empty() {
        return None;
    }
    Some(Insight::new(
        Severity::High,
        "Privilege Concentration",
        format!(
            "These privileges are held by more than half of all users: {}.",
            broad.join(", ")
        ),
        "Apply least privilege: grant these through narrowly scoped groups instead of broadly.".into(),
    ))
}

fn problematic_queries(stats: &WorkspaceStats) -> Option<Insight> {
    let failed = stats
        .recent_queries
        .iter()
        .filter(|q| q.status.eq_ignore_ascii_case("FAILED"))
        .count();
    let slow = stats
        .recent_queries
        .iter()
        .filter(|q| q.duration > SLOW_QUERY_DURATION)
        .count();
    let problematic = stats
        .recent_queries
        .iter()
        .filter(|q| q.status.eq_ignore_ascii_case("FAILED") || q.duration > SLOW_QUERY_DURATION)
        .count();
    if problematic == 0 {
        return None;
    }
    Some(Insight::new(
        Severity::Medium,
        "Problematic Queries",
        format!(
            "{} recent queries need attention ({} failed, {} ran longer than {}).",
            problematic, failed, slow, SLOW_QUERY_DURATION
        ),
        "Inspect failing queries for errors and optimize slow ones with filters, partitioning or caching.".into(),
    ))
}

/// Numbered chat rendering of an analysis
pub fn format_report(insights: &[Insight]) -> String {
    let mut out = String::from("Here's what I found in your workspace:\n");
    for (i, insight) in insights.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. [{}] {}\n   Issue: {}\n   Recommendation: {}\n",
            i + 1,
            insight.severity.to_string().to_uppercase(),
            insight.title,
            insight.description,
            insight.recommendation
        ));
    }
    out.push_str("\nWould you like help acting on any of these recommendations?");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> WorkspaceStats {
        WorkspaceStats {
            total_catalogs: 3,
            total_users: 100,
            active_users: 80,
            catalog_usage: vec![
                CatalogUsage { name: "a".into(), value: 30.0 },
                CatalogUsage { name: "b".into(), value: 30.0 },
                CatalogUsage { name: "c".into(), value: 30.0 },
                CatalogUsage { name: "d".into(), value: 10.0 },
            ],
            daily_usage: vec![DailyUsage { day: "Mon".into(), queries: 100 }],
            recent_queries: vec![QuerySample { status: "SUCCEEDED".into(), duration: 60.0 }],
            privilege_distribution: [("SELECT".to_string(), 50)].into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_boundaries_do_not_fire() {
        // every value sits exactly on its limit
        assert_eq!(analyze(&quiet()), vec![Insight::no_issues()]);
    }

    #[test]
    fn test_empty_snapshot_has_no_issues() {
        let insights = analyze(&WorkspaceStats::default());
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Low);
        assert_eq!(insights[0].title, "No Critical Issues");
    }

    #[test]
    fn test_low_engagement_alone() {
        let stats = WorkspaceStats {
            total_users: 100,
            active_users: 20,
            ..Default::default()
        };
        let insights = analyze(&stats);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Medium);
        assert_eq!(insights[0].title, "Low User Engagement");
        assert!(insights[0].description.contains("20 of 100"));
    }

    #[test]
    fn test_all_rules_fire_in_order() {
        let stats = WorkspaceStats {
            total_users: 10,
            active_users: 1,
            catalog_usage: vec![
                CatalogUsage { name: "sales".into(), value: 90.0 },
                CatalogUsage { name: "hr".into(), value: 10.0 },
            ],
            daily_usage: vec![
                DailyUsage { day: "Mon".into(), queries: 150 },
                DailyUsage { day: "Tue".into(), queries: 20 },
            ],
            recent_queries: vec![
                QuerySample { status: "FAILED".into(), duration: 1.0 },
                QuerySample { status: "SUCCEEDED".into(), duration: 61.0 },
                QuerySample { status: "SUCCEEDED".into(), duration: 2.0 },
            ],
            privilege_distribution: [("ALL_PRIVILEGES".to_string(), 6), ("SELECT".to_string(), 2)]
                .into(),
            ..Default::default()
        };
        let insights = analyze(&stats);
        let titles: Vec<&str> = insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Storage Concentration",
                "Query Spikes",
                "Low User Engagement",
                "Privilege Concentration",
                "Problematic Queries",
            ]
        );
        assert!(insights[0].description.contains("sales (90.0%)"));
        assert!(!insights[0].description.contains("hr"));
        assert!(insights[1].description.contains("Mon (150 queries)"));
        assert!(!insights[1].description.contains("Tue"));
        assert!(insights[3].description.contains("ALL_PRIVILEGES"));
        assert!(!insights[3].description.contains("SELECT"));
        assert!(insights[4].description.starts_with("2 recent queries"));
    }

    #[test]
    fn test_fetch_failure_is_single_error_insight() {
        let insights = analyze_result(Err(BackendError::new("connection refused")));
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Error);
        assert!(insights[0].description.contains("connection refused"));
    }

    #[test]
    fn test_stats_deserialize_camel_case() {
        let json = r#"{
            "totalUsers": 4, "activeUsers": 1,
            "catalogUsage": [{"name": "main", "value": 12.5}],
            "privilegeDistribution": {"USE_CATALOG": 3}
        }"#;
        let stats: WorkspaceStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.catalog_usage[0].value, 12.5);
        assert_eq!(stats.privilege_distribution["USE_CATALOG"], 3);
        assert!(stats.daily_usage.is_empty());
    }

    #[test]
    fn test_storage_description_agrees_with_count() {
        let one = WorkspaceStats {
            catalog_usage: vec![
                CatalogUsage { name: "sales".into(), value: 90.0 },
                CatalogUsage { name: "hr".into(), value: 10.0 },
            ],
            ..Default::default()
        };
        assert_eq!(
            storage_concentration(&one).unwrap().description,
            "One catalog accounts for more than 30% of total catalog usage: sales (90.0%)."
        );

        let two = WorkspaceStats {
            catalog_usage: vec![
                CatalogUsage { name: "a".into(), value: 45.0 },
                CatalogUsage { name: "b".into(), value: 45.0 },
                CatalogUsage { name: "c".into(), value: 10.0 },
            ],
            ..Default::default()
        };
        assert_eq!(
            storage_concentration(&two).unwrap().description,
            "Several catalogs each account for more than 30% of total catalog usage: a (45.0%), b (45.0%)."
        );
    }

    #[test]
    fn test_report_format() {
        let report = format_report(&[Insight::no_issues()]);
        assert!(report.starts_with("Here's what I found in your workspace:\n\n1. [LOW] No Critical Issues\n"));
        assert!(report.contains("   Recommendation: Keep monitoring"));
        assert!(report.ends_with("Would you like help acting on any of these recommendations?"));
    }
}
