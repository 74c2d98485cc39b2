use crate::build_info::BuildInfo;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    Created,
    InProgress,
    /// `complete` is reconciling and closing the run.
    Completing,
    Completed,
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Created => "Created",
            RunState::InProgress => "InProgress",
            RunState::Completing => "Completing",
            RunState::Completed => "Completed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub id: u64,
    pub name: String,
    pub plan_id: u64,
    pub plan_name: String,
    pub suite_id: u64,
    pub suite_name: String,
    pub test_env: String,
    pub state: RunState,
    pub comment: String,
    pub build: Option<BuildInfo>,
}

/// Deep links into the test-management web UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunLinks {
    project_url: String,
}

impl RunLinks {
    pub fn new(org_url: &str, project: &str) -> Self {
        Self {
            project_url: format!("{}/{}", org_url.trim_end_matches('/'), project),
        }
    }

    pub fn run_url(&self, run_id: u64) -> String {
        format!("{}/_TestManagement/Runs?runId={}&_a=runCharts", self.project_url, run_id)
    }

    pub fn result_url(&self, run_id: u64, result_id: u64) -> String {
        format!(
            "{}/_TestManagement/Runs?runId={}&_a=resultSummary&resultId={}",
            self.project_url, run_id, result_id
        )
    }

    pub fn work_item_url(&self, case_id: &str) -> String {
        format!("{}/_workitems/edit/{}", self.project_url, case_id)
    }
}

/// Links for one failed case, consumed by failure notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureLink {
    pub case_id: String,
    pub work_item_url: String,
    pub result_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_share_the_project_root() {
        let links = RunLinks::new("https://dev.example.com/acme/", "Quality");
        assert_eq!(
            links.run_url(42),
            "https://dev.example.com/acme/Quality/_TestManagement/Runs?runId=42&_a=runCharts"
        );
        assert_eq!(
            links.result_url(42, 100007),
            "https://dev.example.com/acme/Quality/_TestManagement/Runs?runId=42&_a=resultSummary&resultId=100007"
        );
        assert_eq!(
            links.work_item_url("5511"),
            "https://dev.example.com/acme/Quality/_workitems/edit/5511"
        );
    }

    #[test]
    fn state_names_match_remote_spelling() {
        assert_eq!(RunState::InProgress.to_string(), "InProgress");
        assert_eq!(RunState::Completed.to_string(), "Completed");
    }
}
