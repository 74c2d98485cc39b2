//! Run lifecycle: `start` creates and maps the remote run, `complete`
//! reconciles unexecuted cases and closes it.

use crate::aggregate::{AggregateCounts, Aggregator};
use crate::artifacts::ArtifactUploader;
use crate::build_info::{BuildInfo, BuildInfoProvider, DEFAULT_FLAVOR, DEFAULT_PLATFORM};
use crate::case::steps::{StepLogRenderer, TextStepLog};
use crate::comment::truncate_comment;
use crate::config::RunConfig;
use crate::error::{SyncError, SyncResult};
use crate::finalize::{host_name, FinalizationEngine, FinalizeRequest, Finalized};
use crate::hooks::{Enrichment, SyncHooks, TracingSyncHooks};
use crate::mapping::ResultMappingTable;
use crate::reconcile::{Reconciler, BATCH_SIZE};
use crate::remote::model::{
    AutomationIdentity, CreateRunRequest, IdRef, PointConfiguration, ResultPatch, RunPatch,
    TestConfiguration, TestPoint, STATE_IN_PROGRESS,
};
use crate::remote::TestManagementApi;
use crate::run::model::{FailureLink, Run, RunLinks, RunState};
use crate::run::summary::RunSummary;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const UNKNOWN_PLAN: &str = "UnknownPlan";
const UNKNOWN_SUITE: &str = "UnknownSuite";

pub struct RunController {
    api: Arc<dyn TestManagementApi>,
    config: RunConfig,
    build_info: Option<Arc<dyn BuildInfoProvider>>,
    hooks: Arc<dyn SyncHooks>,
    step_log: Arc<dyn StepLogRenderer>,
    host_name: String,
}

impl RunController {
    pub fn new(api: Arc<dyn TestManagementApi>, config: RunConfig) -> Self {
        Self {
            api,
            config,
            build_info: None,
            hooks: Arc::new(TracingSyncHooks),
            step_log: Arc::new(TextStepLog),
            host_name: host_name(),
        }
    }

    pub fn with_build_info(mut self, provider: Arc<dyn BuildInfoProvider>) -> Self {
        self.build_info = Some(provider);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SyncHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_step_log(mut self, step_log: Arc<dyn StepLogRenderer>) -> Self {
        self.step_log = step_log;
        self
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    /// Creates the remote run for every point of the configured suite and
    /// maps its results. Point listing, run creation and mapping failures
    /// are fatal; everything else degrades.
    pub async fn start(&self) -> SyncResult<ActiveRun> {
        let plan_id = self.config.plan_id;
        let suite_id = self.config.suite_id;
        let plan_name = self.display_name(self.api.plan_name(plan_id).await, UNKNOWN_PLAN);
        let suite_name = self.display_name(self.api.suite_name(plan_id, suite_id).await, UNKNOWN_SUITE);

        let points = self.api.list_points(plan_id, suite_id).await?;
        if self.config.assign_configuration {
            self.assign_configuration(&points).await;
        }
        let build = self.resolve_build().await;
        let owners = owners_from_points(&points);

        let request = CreateRunRequest {
            name: run_title(&plan_name, &self.config, Local::now()),
            plan: IdRef { id: plan_id },
            point_ids: points.iter().map(|point| point.id).collect(),
            automated: true,
            state: STATE_IN_PROGRESS.to_string(),
            build: build.as_ref().map(|build| IdRef { id: build.id }),
            comment: truncate_comment(&run_comment(build.as_ref(), &self.config)),
        };
        let remote = self.api.create_run(&request).await?;
        info!(run_id = remote.id, name = %request.name, points = points.len(), "created test run");

        let mapping = Arc::new(ResultMappingTable::new());
        let mapped = mapping
            .populate(self.api.as_ref(), remote.id, points.len())
            .await?;

        let run = Run {
            id: remote.id,
            name: request.name,
            plan_id,
            plan_name,
            suite_id,
            suite_name,
            test_env: self.config.test_env.clone(),
            state: RunState::InProgress,
            comment: request.comment,
            build,
        };
        let active = ActiveRun::new(
            self.api.clone(),
            self.config.clone(),
            run,
            remote.web_access_url,
            mapping,
            self.hooks.clone(),
            self.step_log.clone(),
            self.host_name.clone(),
        );
        active.sync_owners(&owners).await;
        active.update_metadata().await;
        self.hooks.on_run_created(&active.run(), mapped);
        Ok(active)
    }

    fn display_name(&self, lookup: SyncResult<Option<String>>, fallback: &str) -> String {
        match lookup {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => fallback.to_string(),
            Err(err) => {
                self.hooks.on_enrichment_failed(Enrichment::NameLookup, None, &err);
                fallback.to_string()
            }
        }
    }

    /// Best effort: a failure is reported and the run starts without it.
    async fn assign_configuration(&self, points: &[TestPoint]) {
        let name = configuration_name(&self.config.test_env, std::env::consts::OS);
        let configuration =
            TestConfiguration::active(name.as_str(), format!("Automated runs on {}", name));
        let assigned = async {
            let id = self.api.create_configuration(&configuration).await?;
            let assignments: Vec<PointConfiguration> = points
                .iter()
                .map(|point| PointConfiguration {
                    id: point.id,
                    configuration: IdRef { id },
                })
                .collect();
            self.api
                .assign_configuration(self.config.plan_id, self.config.suite_id, &assignments)
                .await?;
            Ok::<u64, SyncError>(id)
        }
        .await;
        match assigned {
            Ok(id) => {
                info!(configuration_id = id, name = %name, points = points.len(), "assigned test configuration");
            }
            Err(err) => self.hooks.on_enrichment_failed(Enrichment::Configuration, None, &err),
        }
    }

    async fn resolve_build(&self) -> Option<BuildInfo> {
        let (provider, definition_id) = match (&self.build_info, self.config.build_definition_id) {
            (Some(provider), Some(definition_id)) => (provider, definition_id),
            _ => return None,
        };
        match provider.latest_successful(definition_id).await {
            Ok(build) => Some(build),
            Err(err) => {
                self.hooks.on_enrichment_failed(Enrichment::BuildInfo, None, &err);
                None
            }
        }
    }
}

fn owners_from_points(points: &[TestPoint]) -> Vec<(String, String)> {
    points
        .iter()
        .filter_map(|point| {
            let case_id = point.test_case.as_ref()?.id.clone();
            Some((case_id, point.owner_name()?))
        })
        .collect()
}

/// First letter upper case, the rest lower case.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `{Env}-{OS}`, with the OS named the way the test agents report it.
fn configuration_name(test_env: &str, os: &str) -> String {
    let os_name = match os {
        "linux" => "Linux".to_string(),
        "windows" => "Windows".to_string(),
        "macos" => "Darwin".to_string(),
        other => capitalize(other),
    };
    format!("{}-{}", capitalize(test_env), os_name)
}

fn run_title(plan_name: &str, config: &RunConfig, now: DateTime<Local>) -> String {
    format!(
        "{} - {} ({}-{}) {}",
        plan_name,
        capitalize(&config.suite_type),
        config.pipeline_mode,
        capitalize(&config.test_env),
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

fn run_comment(build: Option<&BuildInfo>, config: &RunConfig) -> String {
    format!(
        "Release: {} | Stage: {} | Platform: {} | Flavor: {} | TestSettings: {} | Env: {}",
        build.map_or("unknown".to_string(), |build| build.build_number.clone()),
        build.map_or(String::new(), BuildInfo::stage),
        build.map_or(DEFAULT_PLATFORM.to_string(), BuildInfo::platform),
        build.map_or(DEFAULT_FLAVOR.to_string(), BuildInfo::flavor),
        config.test_settings,
        config.test_env
    )
}

fn check_state(actual: RunState, expected: RunState) -> SyncResult<()> {
    if actual != expected {
        return Err(SyncError::RunState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// A started run. Shared behind `Arc` by concurrent test workers.
pub struct ActiveRun {
    api: Arc<dyn TestManagementApi>,
    config: RunConfig,
    run: Mutex<Run>,
    web_url: Option<String>,
    links: RunLinks,
    mapping: Arc<ResultMappingTable>,
    aggregator: Arc<Aggregator>,
    artifacts: ArtifactUploader,
    engine: FinalizationEngine,
    hooks: Arc<dyn SyncHooks>,
    identity: AutomationIdentity,
}

impl ActiveRun {
    #[allow(clippy::too_many_arguments)]
    fn new(
        api: Arc<dyn TestManagementApi>,
        config: RunConfig,
        run: Run,
        web_url: Option<String>,
        mapping: Arc<ResultMappingTable>,
        hooks: Arc<dyn SyncHooks>,
        step_log: Arc<dyn StepLogRenderer>,
        host_name: String,
    ) -> Self {
        let identity = AutomationIdentity {
            test_type: config.automated_test_type.clone(),
            test_storage: config.automated_test_storage.clone(),
        };
        let aggregator = Arc::new(Aggregator::new());
        let artifacts = ArtifactUploader::new(api.clone(), run.id, config.artifacts_dir.clone());
        let engine = FinalizationEngine::new(
            api.clone(),
            run.id,
            mapping.clone(),
            aggregator.clone(),
            artifacts.clone(),
            step_log,
            hooks.clone(),
            identity.clone(),
            host_name,
        );
        Self {
            links: RunLinks::new(&config.org_url, &config.project),
            api,
            config,
            run: Mutex::new(run),
            web_url,
            mapping,
            aggregator,
            artifacts,
            engine,
            hooks,
            identity,
        }
    }

    pub fn id(&self) -> u64 {
        self.run.lock().id
    }

    pub fn run(&self) -> Run {
        self.run.lock().clone()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn mapping(&self) -> &ResultMappingTable {
        &self.mapping
    }

    pub fn counts(&self) -> AggregateCounts {
        self.aggregator.counts()
    }

    pub async fn finalize(&self, request: FinalizeRequest) -> SyncResult<Finalized> {
        self.ensure_in_progress()?;
        self.engine.finalize(request).await
    }

    /// Attaches a file (e.g. a recording) to the case's result. Returns
    /// whether the upload succeeded.
    pub async fn attach_file(&self, case_id: &str, path: &Path, comment: &str) -> SyncResult<bool> {
        let result_id = self
            .mapping
            .result_for(case_id)
            .ok_or_else(|| SyncError::UnknownCase {
                case_id: case_id.to_string(),
            })?;
        match self.artifacts.attach_file(result_id, path, comment).await {
            Ok(()) => Ok(true),
            Err(err) => {
                self.hooks
                    .on_enrichment_failed(Enrichment::Attachment, Some(case_id), &err);
                Ok(false)
            }
        }
    }

    pub async fn attach_to_run(&self, content: &[u8], file_name: &str, comment: &str) -> bool {
        match self.artifacts.attach_to_run(content, file_name, comment).await {
            Ok(()) => true,
            Err(err) => {
                self.hooks.on_enrichment_failed(Enrichment::Attachment, None, &err);
                false
            }
        }
    }

    pub async fn attach_file_to_run(&self, path: &Path, comment: &str) -> bool {
        match self.artifacts.attach_file_to_run(path, comment).await {
            Ok(()) => true,
            Err(err) => {
                self.hooks.on_enrichment_failed(Enrichment::Attachment, None, &err);
                false
            }
        }
    }

    /// One-line failure digest, e.g. `2 failed: C3, C7`.
    pub fn failure_digest(&self) -> String {
        let failures = self.aggregator.failures();
        if failures.is_empty() {
            "All tests passed.".to_string()
        } else {
            format!("{} failed: {}", failures.len(), failures.join(", "))
        }
    }

    pub async fn attach_failure_digest(&self) -> bool {
        let file_name = format!("run_summary_{}.txt", Local::now().format("%Y-%m-%d_%H-%M-%S"));
        self.attach_to_run(self.failure_digest().as_bytes(), &file_name, "Run summary")
            .await
    }

    /// Number of cases in the suite, or the number of mapped cases when the
    /// suite cannot be listed.
    pub async fn planned_total(&self) -> usize {
        match self
            .api
            .list_suite_cases(self.config.plan_id, self.config.suite_id)
            .await
        {
            Ok(cases) => cases.len(),
            Err(err) => {
                self.hooks.on_enrichment_failed(Enrichment::PlannedTotal, None, &err);
                self.mapping.len()
            }
        }
    }

    pub async fn summary(&self, branch: &str) -> RunSummary {
        RunSummary {
            domain_tag: self.config.domain_tag.clone(),
            mode: if self.config.is_pipeline() { "Pipeline" } else { "Local" }.to_string(),
            env: self.config.test_env.clone(),
            branch: branch.to_string(),
            timestamp: Local::now().format("%Y-%m-%d %I:%M%p").to_string(),
            planned: self.planned_total().await,
            counts: self.aggregator.counts(),
        }
    }

    /// Marks unexecuted cases, appends `summary_text` to the run comment and
    /// moves the run to Completed. Finalization is refused while this runs.
    /// A failed completion patch puts the run back in progress so `complete`
    /// can be retried.
    pub async fn complete(&self, summary_text: &str) -> SyncResult<Run> {
        let (run_id, local_comment) = {
            let mut run = self.run.lock();
            check_state(run.state, RunState::InProgress)?;
            run.state = RunState::Completing;
            (run.id, run.comment.clone())
        };

        Reconciler::new(
            self.api.clone(),
            run_id,
            self.mapping.clone(),
            self.aggregator.clone(),
            self.hooks.clone(),
            self.identity.clone(),
        )
        .reconcile()
        .await;

        let existing = match self.api.get_run(run_id).await {
            Ok(remote) => remote.comment.unwrap_or_default(),
            Err(err) => {
                self.hooks.on_enrichment_failed(Enrichment::RunComment, None, &err);
                local_comment
            }
        };
        let comment = truncate_comment(&format!("{}{}", existing, summary_text));

        if let Err(err) = self.api.patch_run(run_id, &RunPatch::complete(comment.clone())).await {
            warn!(run_id, error = %err, "run could not be completed, still in progress");
            self.run.lock().state = RunState::InProgress;
            return Err(err);
        }

        let run = {
            let mut run = self.run.lock();
            run.state = RunState::Completed;
            run.comment = comment;
            run.clone()
        };
        self.hooks.on_run_completed(&run, &self.aggregator.counts());
        Ok(run)
    }

    pub fn run_url(&self) -> String {
        self.web_url
            .clone()
            .unwrap_or_else(|| self.links.run_url(self.id()))
    }

    pub fn result_url(&self, case_id: &str) -> Option<String> {
        self.mapping
            .result_for(case_id)
            .map(|result_id| self.links.result_url(self.id(), result_id))
    }

    pub fn work_item_url(&self, case_id: &str) -> String {
        self.links.work_item_url(case_id)
    }

    pub fn failure_links(&self) -> Vec<FailureLink> {
        self.aggregator
            .failures()
            .into_iter()
            .map(|case_id| FailureLink {
                work_item_url: self.work_item_url(&case_id),
                result_url: self.result_url(&case_id),
                case_id,
            })
            .collect()
    }

    fn ensure_in_progress(&self) -> SyncResult<()> {
        check_state(self.run.lock().state, RunState::InProgress)
    }

    async fn sync_owners(&self, owners: &[(String, String)]) {
        let patches: Vec<ResultPatch> = owners
            .iter()
            .filter_map(|(case_id, owner)| {
                self.mapping
                    .result_for(case_id)
                    .map(|result_id| ResultPatch::owner(result_id, owner.clone()))
            })
            .collect();
        let run_id = self.id();
        for chunk in patches.chunks(BATCH_SIZE) {
            if let Err(err) = self.api.patch_results(run_id, chunk).await {
                self.hooks.on_enrichment_failed(Enrichment::OwnerSync, None, &err);
            }
        }
    }

    async fn update_metadata(&self) {
        let (run_id, build) = {
            let run = self.run.lock();
            (run.id, run.build.clone())
        };
        let platform = build
            .as_ref()
            .map_or(DEFAULT_PLATFORM.to_string(), BuildInfo::platform);
        let patch = RunPatch {
            release: build.as_ref().map(|build| build.build_number.clone()),
            release_stage: build.as_ref().map(BuildInfo::stage),
            build_platform: Some(platform.clone()),
            build_flavor: Some(build.as_ref().map_or(DEFAULT_FLAVOR.to_string(), BuildInfo::flavor)),
            test_settings: Some(self.config.test_settings.clone()),
            mtmlab_environment: Some(platform),
            ..RunPatch::default()
        };
        if let Err(err) = self.api.patch_run(run_id, &patch).await {
            self.hooks.on_enrichment_failed(Enrichment::RunMetadata, None, &err);
        }
    }
}
