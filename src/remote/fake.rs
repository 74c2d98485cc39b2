//! In-memory stand-in for the test-management service.

use crate::error::{RemoteServiceError, SyncResult};
use crate::remote::client::TestManagementApi;
use crate::remote::model::{
    Attachment, CaseRef, CreateRunRequest, DisplayRef, PointConfiguration, RemoteResult, RemoteRun,
    ResultPatch, RunPatch, SuiteTestCase, TestConfiguration, TestPoint,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

pub(crate) const RESULT_ID_BASE: u64 = 1000;

#[derive(Default)]
pub(crate) struct FakeState {
    pub points: Vec<TestPoint>,
    pub suite_case_count: Option<usize>,
    pub provision_results: bool,
    pub runs: HashMap<u64, RemoteRun>,
    pub results: HashMap<u64, Vec<RemoteResult>>,
    pub created: Vec<CreateRunRequest>,
    pub run_patches: Vec<(u64, RunPatch)>,
    pub result_batches: Vec<Vec<ResultPatch>>,
    pub result_attachments: Vec<(u64, Attachment)>,
    pub run_attachments: Vec<Attachment>,
    pub configurations: Vec<TestConfiguration>,
    pub point_configurations: Vec<(u64, u64, Vec<PointConfiguration>)>,
    pub get_run_calls: usize,
    pub failing_operations: HashMap<&'static str, usize>,
    pub failing_patch_calls: HashSet<usize>,
    patch_calls: usize,
}

pub(crate) struct FakeApi {
    pub state: Mutex<FakeState>,
}

impl FakeApi {
    /// A plan with one point per case; point `n` carries case `case_ids[n-1]`.
    pub fn with_plan(case_ids: &[&str]) -> Self {
        let points = case_ids
            .iter()
            .enumerate()
            .map(|(index, case_id)| TestPoint {
                id: index as u64 + 1,
                test_case: Some(CaseRef { id: case_id.to_string() }),
                assigned_to: None,
            })
            .collect();
        FakeApi {
            state: Mutex::new(FakeState {
                points,
                provision_results: true,
                ..FakeState::default()
            }),
        }
    }

    pub fn with_numbered_plan(count: usize) -> Self {
        let ids: Vec<String> = (1..=count).map(|n| format!("C{}", n)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        Self::with_plan(&refs)
    }

    pub fn assign_owner(&self, case_id: &str, display_name: &str) {
        let mut state = self.state.lock();
        if let Some(point) = state
            .points
            .iter_mut()
            .find(|point| point.test_case.as_ref().map(|c| c.id.as_str()) == Some(case_id))
        {
            point.assigned_to = Some(DisplayRef {
                display_name: display_name.to_string(),
            });
        }
    }

    pub fn fail(&self, operation: &'static str, times: usize) {
        self.state.lock().failing_operations.insert(operation, times);
    }

    pub fn fail_patch_call(&self, index: usize) {
        self.state.lock().failing_patch_calls.insert(index);
    }

    /// Creates run 1 directly, as if `create_run` had been called with every point.
    pub fn seed_run(&self) -> u64 {
        let mut state = self.state.lock();
        let point_ids: Vec<u64> = state.points.iter().map(|p| p.id).collect();
        provision(&mut state, 1, &point_ids);
        1
    }

    pub fn result(&self, run_id: u64, case_id: &str) -> Option<RemoteResult> {
        self.state.lock()
            .results
            .get(&run_id)
            .and_then(|results| results.iter().find(|r| r.case_id() == Some(case_id)).cloned())
    }

    pub fn outcome_batches(&self, outcome: &str) -> Vec<Vec<ResultPatch>> {
        self.state.lock()
            .result_batches
            .iter()
            .filter(|batch| batch.iter().all(|p| p.outcome.as_deref() == Some(outcome)))
            .cloned()
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        let state = self.state.lock();
        state.created.len()
            + state.run_patches.len()
            + state.result_batches.len()
            + state.result_attachments.len()
            + state.run_attachments.len()
            + state.configurations.len()
            + state.point_configurations.len()
    }

    fn check(&self, operation: &'static str) -> SyncResult<()> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.failing_operations.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteServiceError::status(operation, 500, "injected failure").into());
            }
        }
        Ok(())
    }
}

fn provision(state: &mut FakeState, run_id: u64, point_ids: &[u64]) {
    state.runs.insert(
        run_id,
        RemoteRun {
            id: run_id,
            state: Some("InProgress".to_string()),
            comment: Some(String::new()),
            ..RemoteRun::default()
        },
    );
    let results = if state.provision_results {
        state
            .points
            .iter()
            .filter(|point| point_ids.contains(&point.id))
            .enumerate()
            .map(|(index, point)| RemoteResult {
                id: RESULT_ID_BASE + index as u64,
                test_case: point.test_case.clone(),
                outcome: Some("Unspecified".to_string()),
                comment: None,
                automated_test_name: None,
                test_case_title: None,
            })
            .collect()
    } else {
        vec![]
    };
    state.results.insert(run_id, results);
}

#[async_trait]
impl TestManagementApi for FakeApi {
    async fn create_run(&self, request: &CreateRunRequest) -> SyncResult<RemoteRun> {
        self.check("create run")?;
        let mut state = self.state.lock();
        let run_id = state.created.len() as u64 + 1;
        state.created.push(request.clone());
        provision(&mut state, run_id, &request.point_ids);
        if let Some(run) = state.runs.get_mut(&run_id) {
            run.name = Some(request.name.clone());
            run.comment = Some(request.comment.clone());
        }
        Ok(state.runs[&run_id].clone())
    }

    async fn get_run(&self, run_id: u64) -> SyncResult<RemoteRun> {
        self.check("get run")?;
        let mut state = self.state.lock();
        state.get_run_calls += 1;
        state
            .runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| RemoteServiceError::status("get run", 404, "no such run").into())
    }

    async fn patch_run(&self, run_id: u64, patch: &RunPatch) -> SyncResult<RemoteRun> {
        self.check("patch run")?;
        let mut state = self.state.lock();
        state.run_patches.push((run_id, patch.clone()));
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| RemoteServiceError::status("patch run", 404, "no such run"))?;
        if let Some(run_state) = &patch.state {
            run.state = Some(run_state.clone());
        }
        if let Some(comment) = &patch.comment {
            run.comment = Some(comment.clone());
        }
        Ok(run.clone())
    }

    async fn list_results(&self, run_id: u64) -> SyncResult<Vec<RemoteResult>> {
        self.check("list results")?;
        Ok(self.state.lock().results.get(&run_id).cloned().unwrap_or_default())
    }

    async fn patch_results(&self, run_id: u64, patches: &[ResultPatch]) -> SyncResult<()> {
        self.check("patch results")?;
        let mut state = self.state.lock();
        let call = state.patch_calls;
        state.patch_calls += 1;
        state.result_batches.push(patches.to_vec());
        if state.failing_patch_calls.contains(&call) {
            return Err(RemoteServiceError::status("patch results", 400, "rejected batch").into());
        }
        if let Some(results) = state.results.get_mut(&run_id) {
            for patch in patches {
                if let Some(result) = results.iter_mut().find(|r| r.id == patch.id) {
                    if let Some(outcome) = &patch.outcome {
                        result.outcome = Some(outcome.clone());
                    }
                    if let Some(comment) = &patch.comment {
                        result.comment = Some(comment.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn attach_to_result(
        &self,
        _run_id: u64,
        result_id: u64,
        attachment: &Attachment,
    ) -> SyncResult<()> {
        self.check("attach to result")?;
        self.state.lock()
            .result_attachments
            .push((result_id, attachment.clone()));
        Ok(())
    }

    async fn attach_to_run(&self, _run_id: u64, attachment: &Attachment) -> SyncResult<()> {
        self.check("attach to run")?;
        self.state.lock().run_attachments.push(attachment.clone());
        Ok(())
    }

    async fn list_points(&self, _plan_id: u64, _suite_id: u64) -> SyncResult<Vec<TestPoint>> {
        self.check("list points")?;
        Ok(self.state.lock().points.clone())
    }

    async fn plan_name(&self, plan_id: u64) -> SyncResult<Option<String>> {
        self.check("get plan")?;
        Ok(Some(format!("Plan {}", plan_id)))
    }

    async fn suite_name(&self, _plan_id: u64, suite_id: u64) -> SyncResult<Option<String>> {
        self.check("get suite")?;
        Ok(Some(format!("Suite {}", suite_id)))
    }

    async fn list_suite_cases(&self, _plan_id: u64, _suite_id: u64) -> SyncResult<Vec<SuiteTestCase>> {
        self.check("list suite test cases")?;
        let state = self.state.lock();
        let count = state.suite_case_count.unwrap_or(state.points.len());
        Ok((0..count)
            .map(|n| SuiteTestCase {
                test_case: Some(CaseRef { id: n.to_string() }),
            })
            .collect())
    }

    async fn create_configuration(&self, configuration: &TestConfiguration) -> SyncResult<u64> {
        self.check("create configuration")?;
        let mut state = self.state.lock();
        state.configurations.push(configuration.clone());
        Ok(state.configurations.len() as u64)
    }

    async fn assign_configuration(
        &self,
        plan_id: u64,
        suite_id: u64,
        points: &[PointConfiguration],
    ) -> SyncResult<()> {
        self.check("assign configuration")?;
        self.state
            .lock()
            .point_configurations
            .push((plan_id, suite_id, points.to_vec()));
        Ok(())
    }
}
