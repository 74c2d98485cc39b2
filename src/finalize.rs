//! Per-case outcome recording.
//!
//! A case moves from not run to finalized exactly once for counting
//! purposes. Repeat calls still rewrite the remote result so the latest
//! comment, steps and artifacts win.

use crate::aggregate::Aggregator;
use crate::artifacts::{ArtifactUploader, ScreenshotSource};
use crate::case::model::{Outcome, Step};
use crate::case::steps::{render_steps_xml, StepLogRenderer};
use crate::comment::truncate_comment;
use crate::error::{SyncError, SyncResult};
use crate::hooks::{Enrichment, SyncHooks};
use crate::mapping::ResultMappingTable;
use crate::remote::model::{AutomationIdentity, ResultPatch};
use crate::remote::TestManagementApi;
use bon::Builder;
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use tracing::debug;

#[derive(Builder, Clone)]
pub struct FinalizeRequest {
    #[builder(into)]
    pub case_id: String,
    pub outcome: Outcome,
    #[builder(into)]
    pub comment: String,
    #[builder(default)]
    pub steps: Vec<Step>,
    pub screenshot: Option<Arc<dyn ScreenshotSource>>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub case_id: String,
    pub result_id: u64,
    pub outcome: Outcome,
    pub duration_ms: u64,
    /// False when the case had already been finalized in this run.
    pub counted: bool,
}

pub struct FinalizationEngine {
    api: Arc<dyn TestManagementApi>,
    mapping: Arc<ResultMappingTable>,
    aggregator: Arc<Aggregator>,
    artifacts: ArtifactUploader,
    step_log: Arc<dyn StepLogRenderer>,
    hooks: Arc<dyn SyncHooks>,
    identity: AutomationIdentity,
    host_name: String,
    run_id: u64,
}

impl FinalizationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn TestManagementApi>,
        run_id: u64,
        mapping: Arc<ResultMappingTable>,
        aggregator: Arc<Aggregator>,
        artifacts: ArtifactUploader,
        step_log: Arc<dyn StepLogRenderer>,
        hooks: Arc<dyn SyncHooks>,
        identity: AutomationIdentity,
        host_name: String,
    ) -> Self {
        Self {
            api,
            mapping,
            aggregator,
            artifacts,
            step_log,
            hooks,
            identity,
            host_name,
            run_id,
        }
    }

    pub async fn finalize(&self, request: FinalizeRequest) -> SyncResult<Finalized> {
        let duration_ms = elapsed_ms(request.started_at, Utc::now());
        let case_id = request.case_id.as_str();
        let result_id = self
            .mapping
            .result_for(case_id)
            .ok_or_else(|| SyncError::UnknownCase {
                case_id: case_id.to_string(),
            })?;
        let comment = truncate_comment(&request.comment);

        self.api
            .patch_results(
                self.run_id,
                &[ResultPatch::outcome(
                    result_id,
                    case_id,
                    request.outcome.as_str(),
                    comment.clone(),
                    &self.identity,
                )],
            )
            .await?;
        debug!(case_id, result_id, outcome = %request.outcome, "patched outcome");

        let error_message = request.outcome.is_failure().then(|| comment.clone());
        let metadata = ResultPatch::metadata(result_id, duration_ms, self.host_name.clone(), error_message);
        if let Err(err) = self.api.patch_results(self.run_id, &[metadata]).await {
            self.hooks
                .on_enrichment_failed(Enrichment::ResultMetadata, Some(case_id), &err);
        }

        if request.outcome.is_failure() {
            if let Some(source) = &request.screenshot {
                if let Err(err) = self
                    .artifacts
                    .capture_screenshot(source.as_ref(), case_id, result_id)
                    .await
                {
                    self.hooks
                        .on_enrichment_failed(Enrichment::Screenshot, Some(case_id), &err);
                }
            }
        }

        if !request.steps.is_empty() {
            self.record_steps(case_id, result_id, &request.steps).await;
        }

        let counted = self.aggregator.record_finalized(case_id, &request.outcome);
        self.hooks
            .on_case_finalized(case_id, result_id, &request.outcome, counted);

        Ok(Finalized {
            case_id: request.case_id.clone(),
            result_id,
            outcome: request.outcome,
            duration_ms,
            counted,
        })
    }

    async fn record_steps(&self, case_id: &str, result_id: u64, steps: &[Step]) {
        let patch = ResultPatch::steps(result_id, render_steps_xml(steps));
        if let Err(err) = self.api.patch_results(self.run_id, &[patch]).await {
            self.hooks
                .on_enrichment_failed(Enrichment::Steps, Some(case_id), &err);
        }

        let now = Local::now();
        let content = self.step_log.render(steps, now);
        let file_name = self.step_log.file_name(now);
        if let Err(err) = self
            .artifacts
            .attach_bytes(result_id, &content, &file_name, "Test step execution report")
            .await
        {
            self.hooks
                .on_enrichment_failed(Enrichment::StepLog, Some(case_id), &err);
        }
    }
}

/// Milliseconds between `started_at` and `now`; zero when absent or in the future.
fn elapsed_ms(started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    started_at
        .map(|start| (now - start).num_milliseconds().max(0) as u64)
        .unwrap_or(0)
}

/// Name recorded as the executing machine.
pub fn host_name() -> String {
    std::env::var("COMPUTERNAME")
        .ok()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .filter(|name| !name.trim().is_empty())
        .or_else(|| {
            hostname::get()
                .ok()
                .map(|name| name.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "UnknownHost".to_string())
}
