use crate::infrastructure::model::ToolSpec;
use crate::infrastructure::store::{Issue, IssueStore};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub const SEARCH_TOOL_NAME: &str = "search_issues";

const MISSING_PROJECT_DIAGNOSTIC: &str =
    "The query requires a 'project = <KEY>' clause. For example: 'project = PROJ'";
const EMPTY_RESULT_DIAGNOSTIC: &str = "No issues found for the given query.";

static PROJECT_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)project\s*=\s*['"]?(\w+)['"]?"#).expect("project clause regex should compile")
});

static STATUS_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)status\s*=\s*['"]([^'"]+)['"]"#).expect("status clause regex should compile")
});

/// Filters recognized in a query string. Exactly two clauses exist; each is
/// extracted independently and the first occurrence wins. Anything else in
/// the text is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    pub project_key: String,
    pub status_label: Option<String>,
}

impl QueryFilter {
    /// Returns `None` when no project clause is present. A status clause
    /// without a project clause is not a valid query on its own.
    pub fn parse(query: &str) -> Option<Self> {
        let project_key = PROJECT_CLAUSE_RE
            .captures(query)?
            .get(1)?
            .as_str()
            .to_uppercase();
        let status_label = STATUS_CLAUSE_RE
            .captures(query)
            .and_then(|captures| captures.get(1))
            .map(|label| label.as_str().to_string());
        Some(Self {
            project_key,
            status_label,
        })
    }
}

/// Resolves a query string against the store. Total by contract: every
/// outcome, including every failure, is rendered as plain text because the
/// caller feeds it straight back to the model as tool output.
pub fn resolve(store: &IssueStore, query: &str) -> String {
    let Some(filter) = QueryFilter::parse(query) else {
        return MISSING_PROJECT_DIAGNOSTIC.to_string();
    };

    let Some(project) = store.project(&filter.project_key) else {
        return format!(
            "Project '{}' not found. Available projects are: {}",
            filter.project_key,
            store.project_keys().join(", ")
        );
    };

    let issues: Vec<&Issue> = match &filter.status_label {
        Some(label) => {
            let wanted = label.to_lowercase();
            project
                .issues
                .iter()
                .filter(|issue| issue.status.to_lowercase() == wanted)
                .collect()
        }
        None => project.issues.iter().collect(),
    };

    if issues.is_empty() {
        return EMPTY_RESULT_DIAGNOSTIC.to_string();
    }

    issues
        .iter()
        .map(|issue| format!("- {}: {} (Status: {})", issue.key, issue.summary, issue.status))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct SearchArguments {
    query: String,
}

/// The only tool the assistant can call. Holds a shared handle to the store
/// and turns the model's raw JSON arguments into a rendered result.
#[derive(Clone)]
pub struct SearchTool {
    store: Arc<IssueStore>,
}

impl SearchTool {
    pub fn new(store: Arc<IssueStore>) -> Self {
        Self { store }
    }

    pub fn name(&self) -> &'static str {
        SEARCH_TOOL_NAME
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Searches the issue tracker with a simplified JQL-style query. \
                          The query must contain a 'project = <KEY>' clause and may add \
                          an optional status clause. \
                          Example queries: \"project = PROJ\", \"project = WEB and status = 'In Progress'\""
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Query string, e.g. \"project = WEB and status = 'Done'\""
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Never fails. Malformed arguments become a diagnostic the model can
    /// read and recover from, exactly like any other resolver outcome.
    pub fn invoke(&self, raw_arguments: &str) -> String {
        match serde_json::from_str::<SearchArguments>(raw_arguments) {
            Ok(arguments) => {
                debug!(query = arguments.query.as_str(), "Executing issue search");
                resolve(&self.store, &arguments.query)
            }
            Err(err) => format!("An error occurred in the search tool: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> IssueStore {
        IssueStore::seeded()
    }

    #[test]
    fn project_only_query_lists_every_issue_in_order() {
        let output = resolve(&store(), "project = PROJ");
        let expected = "\
- PROJ-1: Fix login button bug on the main page (Status: To Do)
- PROJ-2: Implement new feature for user profiles (Status: In Progress)
- PROJ-3: Update documentation for the public API (Status: Done)";
        assert_eq!(output, expected);
    }

    #[test]
    fn status_clause_narrows_the_listing() {
        let output = resolve(&store(), "project = WEB and status = 'Done'");
        assert_eq!(
            output,
            "- WEB-102: Fix mobile responsiveness issues (Status: Done)"
        );
    }

    #[test]
    fn unknown_project_diagnostic_names_available_keys() {
        let output = resolve(&store(), "project = XYZ");
        assert_eq!(
            output,
            "Project 'XYZ' not found. Available projects are: PROJ, WEB, DATA"
        );
    }

    #[test]
    fn status_without_project_is_rejected() {
        let output = resolve(&store(), "status = 'Done'");
        assert_eq!(output, MISSING_PROJECT_DIAGNOSTIC);
    }

    #[test]
    fn empty_result_yields_fixed_diagnostic() {
        let output = resolve(&store(), "project = DATA and status = 'Blocked'");
        assert_eq!(output, EMPTY_RESULT_DIAGNOSTIC);
    }

    #[test]
    fn clause_keywords_and_values_are_case_insensitive() {
        let by_key = resolve(&store(), "PROJECT = proj");
        assert!(by_key.starts_with("- PROJ-1:"));

        let by_status = resolve(&store(), "project = web AND STATUS = \"done\"");
        assert_eq!(
            by_status,
            "- WEB-102: Fix mobile responsiveness issues (Status: Done)"
        );
    }

    #[test]
    fn project_key_may_be_quoted_either_way() {
        assert_eq!(
            QueryFilter::parse("project = 'WEB'").map(|f| f.project_key),
            Some("WEB".to_string())
        );
        assert_eq!(
            QueryFilter::parse("project = \"data\"").map(|f| f.project_key),
            Some("DATA".to_string())
        );
    }

    #[test]
    fn unquoted_status_clause_is_ignored() {
        // Status values must be quoted; without quotes the clause simply
        // does not register and the project listing is returned whole.
        let output = resolve(&store(), "project = WEB and status = Done");
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn first_clause_wins_when_repeated() {
        let filter = QueryFilter::parse("project = WEB and project = PROJ").expect("parses");
        assert_eq!(filter.project_key, "WEB");

        let filter =
            QueryFilter::parse("status = 'Done' or status = 'To Do' and project = PROJ")
                .expect("parses");
        assert_eq!(filter.status_label.as_deref(), Some("Done"));
    }

    #[test]
    fn multi_word_status_labels_match_exactly() {
        let output = resolve(&store(), "project = DATA and status = 'In Review'");
        assert_eq!(
            output,
            "- DATA-42: Create new sales performance dashboard (Status: In Review)"
        );

        // Substrings are not good enough; the whole label must match.
        let partial = resolve(&store(), "project = DATA and status = 'In'");
        assert_eq!(partial, EMPTY_RESULT_DIAGNOSTIC);
    }

    #[test]
    fn resolution_is_idempotent() {
        let store = store();
        let query = "project = WEB and status = 'Done'";
        assert_eq!(resolve(&store, query), resolve(&store, query));
    }

    #[test]
    fn tool_decodes_arguments_and_delegates() {
        let tool = SearchTool::new(Arc::new(store()));
        let output = tool.invoke(r#"{"query": "project = WEB and status = 'Done'"}"#);
        assert_eq!(
            output,
            "- WEB-102: Fix mobile responsiveness issues (Status: Done)"
        );
    }

    #[test]
    fn tool_reports_malformed_arguments_as_text() {
        let tool = SearchTool::new(Arc::new(store()));
        let output = tool.invoke("{not json");
        assert!(output.starts_with("An error occurred in the search tool:"));
    }

    #[test]
    fn tool_spec_requires_the_query_parameter() {
        let spec = SearchTool::new(Arc::new(store())).spec();
        assert_eq!(spec.name, SEARCH_TOOL_NAME);
        assert_eq!(spec.parameters["required"][0], "query");
        assert_eq!(spec.parameters["properties"]["query"]["type"], "string");
    }
}
