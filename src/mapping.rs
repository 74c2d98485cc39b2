use crate::error::{SyncError, SyncResult};
use crate::remote::TestManagementApi;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Case identifier to remote result identifier, captured once right after
/// the run is created.
#[derive(Debug, Default)]
pub struct ResultMappingTable {
    entries: OnceLock<BTreeMap<String, u64>>,
}

impl ResultMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists the run's pre-provisioned results and records one entry per
    /// case. A non-empty plan that yields no results means the run was not
    /// associated with its suite and is reported as `MappingIncomplete`.
    pub async fn populate(
        &self,
        api: &dyn TestManagementApi,
        run_id: u64,
        planned_points: usize,
    ) -> SyncResult<usize> {
        if self.entries.get().is_some() {
            return Err(SyncError::RunState {
                expected: "unmapped run".to_string(),
                actual: "mapped run".to_string(),
            });
        }
        let results = api.list_results(run_id).await?;
        if results.is_empty() && planned_points > 0 {
            return Err(SyncError::MappingIncomplete {
                run_id,
                planned_points,
            });
        }
        let mut entries = BTreeMap::new();
        for result in &results {
            match result.case_id() {
                Some(case_id) => {
                    debug!(case_id, result_id = result.id, "mapped result");
                    entries.insert(case_id.to_string(), result.id);
                }
                None => warn!(result_id = result.id, "result has no test case, not mapped"),
            }
        }
        let count = entries.len();
        self.entries.set(entries).map_err(|_| SyncError::RunState {
            expected: "unmapped run".to_string(),
            actual: "mapped run".to_string(),
        })?;
        info!(run_id, count, "mapped results to cases");
        Ok(count)
    }

    pub fn result_for(&self, case_id: &str) -> Option<u64> {
        self.entries.get().and_then(|entries| entries.get(case_id).copied())
    }

    pub fn all_case_ids(&self) -> BTreeSet<String> {
        self.entries
            .get()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.get().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_populated(&self) -> bool {
        self.entries.get().is_some()
    }

    #[cfg(test)]
    pub(crate) fn from_entries(entries: &[(&str, u64)]) -> Self {
        let table = Self::new();
        let map = entries
            .iter()
            .map(|(case_id, result_id)| (case_id.to_string(), *result_id))
            .collect();
        let _ = table.entries.set(map);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::{FakeApi, RESULT_ID_BASE};

    #[tokio::test]
    async fn populate_maps_every_provisioned_result() {
        let api = FakeApi::with_plan(&["11", "12", "13"]);
        let run_id = api.seed_run();
        let table = ResultMappingTable::new();

        let count = table.populate(&api, run_id, 3).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(table.result_for("11"), Some(RESULT_ID_BASE));
        assert_eq!(table.result_for("13"), Some(RESULT_ID_BASE + 2));
        assert_eq!(table.result_for("99"), None);
        let ids: Vec<String> = table.all_case_ids().into_iter().collect();
        assert_eq!(ids, vec!["11", "12", "13"]);
    }

    #[tokio::test]
    async fn empty_results_for_planned_points_is_incomplete() {
        let api = FakeApi::with_plan(&["11", "12"]);
        api.state.lock().provision_results = false;
        let run_id = api.seed_run();
        let table = ResultMappingTable::new();

        let err = table.populate(&api, run_id, 2).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::MappingIncomplete { run_id: 1, planned_points: 2 }
        ));
        assert!(!table.is_populated());
    }

    #[tokio::test]
    async fn empty_plan_maps_nothing() {
        let api = FakeApi::with_plan(&[]);
        let run_id = api.seed_run();
        let table = ResultMappingTable::new();

        assert_eq!(table.populate(&api, run_id, 0).await.unwrap(), 0);
        assert!(table.is_populated());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn populate_runs_only_once() {
        let api = FakeApi::with_plan(&["11"]);
        let run_id = api.seed_run();
        let table = ResultMappingTable::new();
        table.populate(&api, run_id, 1).await.unwrap();

        let err = table.populate(&api, run_id, 1).await.unwrap_err();
        assert!(matches!(err, SyncError::RunState { .. }));
    }

    #[tokio::test]
    async fn list_failure_propagates() {
        let api = FakeApi::with_plan(&["11"]);
        let run_id = api.seed_run();
        api.fail("list results", 1);
        let table = ResultMappingTable::new();

        let err = table.populate(&api, run_id, 1).await.unwrap_err();
        assert_eq!(err.remote_status(), Some(500));
    }
}
