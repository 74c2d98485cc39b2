//! Executed-case records read by the `sync` command.

use crate::case::model::{Outcome, Step};
use crate::error::{SyncError, SyncResult};
use crate::finalize::FinalizeRequest;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExecutedCase {
    pub case_id: String,
    pub outcome: Outcome,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Extra files (videos, traces) attached to the case's result.
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl ExecutedCase {
    pub fn to_request(&self) -> FinalizeRequest {
        FinalizeRequest::builder()
            .case_id(self.case_id.clone())
            .outcome(self.outcome.clone())
            .comment(self.comment.clone())
            .steps(self.steps.clone())
            .maybe_started_at(self.started_at)
            .build()
    }
}

pub fn parse_results(source: &str) -> SyncResult<Vec<ExecutedCase>> {
    serde_json::from_str(source).map_err(|err| SyncError::Config(format!("results: {}", err)))
}

pub fn load_results(path: &Path) -> SyncResult<Vec<ExecutedCase>> {
    let source = std::fs::read_to_string(path)
        .map_err(|err| SyncError::Config(format!("{}: {}", path.display(), err)))?;
    parse_results(&source)
}
