#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub status: String,
}

impl Issue {
    pub fn new(key: impl Into<String>, summary: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: summary.into(),
            status: status.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub key: String,
    pub issues: Vec<Issue>,
}

impl Project {
    pub fn new(key: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self {
            key: key.into(),
            issues,
        }
    }
}

/// Read-only issue inventory, grouped by project key. Keys are stored
/// upper-cased and looked up case-insensitively; project and issue order is
/// the insertion order, which listings rely on.
#[derive(Debug, Clone, Default)]
pub struct IssueStore {
    projects: Vec<Project>,
}

impl IssueStore {
    pub fn new(projects: Vec<Project>) -> Self {
        let projects = projects
            .into_iter()
            .map(|project| Project {
                key: project.key.to_uppercase(),
                issues: project.issues,
            })
            .collect();
        Self { projects }
    }

    /// Demo inventory used by every front end. There is no persistence
    /// layer; the process serves exactly this data.
    pub fn seeded() -> Self {
        Self::new(vec![
            Project::new(
                "PROJ",
                vec![
                    Issue::new("PROJ-1", "Fix login button bug on the main page", "To Do"),
                    Issue::new("PROJ-2", "Implement new feature for user profiles", "In Progress"),
                    Issue::new("PROJ-3", "Update documentation for the public API", "Done"),
                ],
            ),
            Project::new(
                "WEB",
                vec![
                    Issue::new("WEB-101", "Redesign the entire landing page", "In Progress"),
                    Issue::new("WEB-102", "Fix mobile responsiveness issues", "Done"),
                ],
            ),
            Project::new(
                "DATA",
                vec![Issue::new(
                    "DATA-42",
                    "Create new sales performance dashboard",
                    "In Review",
                )],
            ),
        ])
    }

    pub fn project(&self, key: &str) -> Option<&Project> {
        let normalized = key.to_uppercase();
        self.projects.iter().find(|project| project.key == normalized)
    }

    pub fn project_keys(&self) -> Vec<&str> {
        self.projects.iter().map(|project| project.key.as_str()).collect()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_key_case() {
        let store = IssueStore::seeded();

        let lower = store.project("proj").expect("lower-case key should match");
        let upper = store.project("PROJ").expect("upper-case key should match");
        assert_eq!(lower.key, "PROJ");
        assert_eq!(lower, upper);
    }

    #[test]
    fn unknown_key_yields_none() {
        let store = IssueStore::seeded();
        assert!(store.project("XYZ").is_none());
    }

    #[test]
    fn keys_keep_seed_order() {
        let store = IssueStore::seeded();
        assert_eq!(store.project_keys(), vec!["PROJ", "WEB", "DATA"]);
    }

    #[test]
    fn issues_keep_insertion_order() {
        let store = IssueStore::seeded();
        let keys: Vec<&str> = store
            .project("PROJ")
            .expect("seeded project")
            .issues
            .iter()
            .map(|issue| issue.key.as_str())
            .collect();
        assert_eq!(keys, vec!["PROJ-1", "PROJ-2", "PROJ-3"]);
    }

    #[test]
    fn constructor_normalizes_keys() {
        let store = IssueStore::new(vec![Project::new("ops", vec![])]);
        assert_eq!(store.project_keys(), vec!["OPS"]);
        assert!(store.project("Ops").is_some());
    }
}
